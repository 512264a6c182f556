//! Column-count validation for split rows.

use super::splitter::{has_open_quote, split_fields};
use super::{DELIMITER, QUOTE, Record};

/// Outcome of validating one candidate row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The row has exactly the expected number of fields.
    Valid(Record),
    /// The row is probably the head of a logical row that continues on the
    /// next line.
    Incomplete(Fragment),
}

/// An incomplete row, rejoined so it can absorb the following line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Raw fields joined with the delimiter.
    pub text: String,
    /// Number of fields the row split into.
    pub field_count: usize,
    /// Whether the row ends inside a quoted field.
    pub open_quote: bool,
}

/// Checks rows against the configured column count.
#[derive(Debug, Clone)]
pub struct RowValidator {
    expected: usize,
    quoted_newlines: bool,
}

impl RowValidator {
    /// Create a validator for rows of `expected` fields.
    ///
    /// With `quoted_newlines`, a row with an unbalanced quote is always
    /// incomplete, whatever its field count.
    pub fn new(expected: usize, quoted_newlines: bool) -> Self {
        Self {
            expected,
            quoted_newlines,
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Whether appending the next line to `fragment` could still produce a
    /// valid row.
    ///
    /// With `quoted_newlines`, rows only break inside a quoted field, so a
    /// fragment with balanced quotes is already malformed. Without it, any
    /// row still short of the expected count may continue.
    pub fn can_grow(&self, fragment: &Fragment) -> bool {
        if self.quoted_newlines {
            fragment.open_quote
        } else {
            fragment.field_count < self.expected
        }
    }

    /// Split `row` and validate the resulting fields.
    pub fn check(&self, row: &str) -> Validation {
        self.validate(split_fields(row, DELIMITER, QUOTE))
    }

    /// Validate already-split raw fields.
    pub fn validate(&self, fields: Vec<String>) -> Validation {
        let open_quote = self.quoted_newlines && has_open_quote_in(&fields);
        if !open_quote && fields.len() == self.expected {
            return Validation::Valid(Record::from_raw_fields(fields));
        }

        Validation::Incomplete(Fragment {
            text: fields.join(DELIMITER.to_string().as_str()),
            field_count: fields.len(),
            open_quote,
        })
    }
}

fn has_open_quote_in(fields: &[String]) -> bool {
    fields.iter().filter(|f| has_open_quote(f, QUOTE)).count() % 2 == 1
}
