//! Row reconstruction: reassembly, field splitting, and validation.
//!
//! Text flows through three stages:
//! - [`Reassembler`] turns chunks into terminated candidate rows
//! - [`split_fields`] splits a row on delimiters outside quoted spans
//! - [`RowValidator`] accepts rows with the expected column count, or hands
//!   back a [`Fragment`] to be merged with the following line

mod reassembler;
mod splitter;
mod validator;

pub use reassembler::{CandidateRow, Reassembler, TrailingData};
pub use splitter::{ProtectedRow, has_open_quote, quoted_spans, split_fields, unquote};
pub use validator::{Fragment, RowValidator, Validation};

/// Row terminator.
pub const TERMINATOR: char = '\n';
/// Column delimiter.
pub const DELIMITER: char = ',';
/// Quote character around fields that contain delimiters.
pub const QUOTE: char = '"';

/// A validated row, ready for a sink.
///
/// Fields are in column order with enclosing quotes removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Build a record from raw split fields, stripping enclosing quotes.
    pub fn from_raw_fields(raw: Vec<String>) -> Self {
        let fields = raw
            .into_iter()
            .map(|field| {
                let inner = unquote(&field, QUOTE);
                if inner.len() == field.len() {
                    field
                } else {
                    inner.to_string()
                }
            })
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }
}

impl<S: Into<String>> FromIterator<S> for Record {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_strips_enclosing_quotes() {
        let record = Record::from_raw_fields(vec![
            "a".to_string(),
            "\"b,c\"".to_string(),
            "\"\"".to_string(),
            "say \"hi\"".to_string(),
        ]);
        assert_eq!(record.fields(), &["a", "b,c", "", "say \"hi\""]);
        assert_eq!(record.get(1), Some("b,c"));
        assert_eq!(record.get(4), None);
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_record_from_iter() {
        let record: Record = ["1", "2"].into_iter().collect();
        assert_eq!(record.into_fields(), vec!["1".to_string(), "2".to_string()]);
    }
}
