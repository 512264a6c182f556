//! Reassembles terminated rows from arbitrarily cut chunks.

use std::mem;

use super::TERMINATOR;

/// A line of input that ended with a terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    /// 1-based input line the row starts on.
    pub line: u64,
    /// Row text without its terminator.
    pub text: String,
}

impl CandidateRow {
    /// Whether the line holds nothing but an optional carriage return.
    pub fn is_blank(&self) -> bool {
        self.text.trim_end_matches('\r').is_empty()
    }
}

/// Unterminated text left over at end of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailingData {
    /// 1-based input line the text starts on.
    pub line: u64,
    /// Size of the leftover text in bytes.
    pub bytes: usize,
    pub text: String,
}

/// Owns the pending buffer between chunks.
///
/// Every terminator is trusted as a row boundary here, including one inside
/// a quoted field; stitching those rows back together is the pipeline's job.
/// Blank lines are yielded too, since one may sit inside a quoted field.
#[derive(Debug)]
pub struct Reassembler {
    pending: String,
    /// Line number of the first line in `pending`.
    line: u64,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            pending: String::new(),
            line: 1,
        }
    }

    /// Append a chunk and return every row it completed, in order.
    ///
    /// Text after the last terminator stays pending.
    pub fn feed(&mut self, chunk: &str) -> Vec<CandidateRow> {
        let searched = self.pending.len();
        self.pending.push_str(chunk);

        let Some(last) = self.pending[searched..].rfind(TERMINATOR) else {
            return Vec::new();
        };
        let complete: String = self
            .pending
            .drain(..=searched + last)
            .collect();

        let mut rows = Vec::new();
        for text in complete[..complete.len() - TERMINATOR.len_utf8()].split(TERMINATOR) {
            rows.push(CandidateRow {
                line: self.line,
                text: text.to_string(),
            });
            self.line += 1;
        }
        rows
    }

    /// Text received since the last terminator.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Line number the pending text starts on.
    pub fn pending_line(&self) -> u64 {
        self.line
    }

    /// Take whatever is still pending once the input is exhausted.
    ///
    /// Returns `None` if nothing but carriage returns is left.
    pub fn take_remainder(&mut self) -> Option<TrailingData> {
        let text = mem::take(&mut self.pending);
        if text.trim_end_matches('\r').is_empty() {
            return None;
        }
        Some(TrailingData {
            line: self.line,
            bytes: text.len(),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(rows: &[CandidateRow]) -> Vec<&str> {
        rows.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_chunk_without_terminator_stays_pending() {
        let mut r = Reassembler::new();
        assert!(r.feed(r#"a,"b,c","#).is_empty());
        assert_eq!(r.pending(), r#"a,"b,c","#);

        let rows = r.feed("d\n");
        assert_eq!(texts(&rows), vec![r#"a,"b,c",d"#]);
        assert_eq!(rows[0].line, 1);
        assert_eq!(r.pending(), "");
    }

    #[test]
    fn test_remainder_carried_to_next_chunk() {
        let mut r = Reassembler::new();
        let rows = r.feed("1,2,3\n4,5");
        assert_eq!(texts(&rows), vec!["1,2,3"]);
        assert_eq!(r.pending(), "4,5");
        assert_eq!(r.pending_line(), 2);

        let rows = r.feed(",6\n");
        assert_eq!(texts(&rows), vec!["4,5,6"]);
        assert_eq!(rows[0].line, 2);
    }

    #[test]
    fn test_blank_lines_are_yielded() {
        let mut r = Reassembler::new();
        let rows = r.feed("a\n\n\r\nb\n");
        assert_eq!(texts(&rows), vec!["a", "", "\r", "b"]);
        assert_eq!(rows[3].line, 4);
        let blank: Vec<_> = rows.iter().map(CandidateRow::is_blank).collect();
        assert_eq!(blank, vec![false, true, true, false]);
    }

    #[test]
    fn test_carriage_return_kept_for_splitter() {
        let mut r = Reassembler::new();
        let rows = r.feed("a,b\r\nc,d\r\n");
        assert_eq!(texts(&rows), vec!["a,b\r", "c,d\r"]);
    }

    #[test]
    fn test_every_split_offset_yields_same_rows() {
        let input = "id,name\n1,\"Smith, J\"\n2,\"Doe, A\"\n";
        let mut whole = Reassembler::new();
        let expected = whole.feed(input);

        for cut in 0..=input.len() {
            let mut r = Reassembler::new();
            let mut rows = r.feed(&input[..cut]);
            rows.extend(r.feed(&input[cut..]));
            assert_eq!(rows, expected, "cut at {cut}");
            assert!(r.take_remainder().is_none());
        }
    }

    #[test]
    fn test_one_byte_chunks() {
        let input = "x,y\nz,w\n";
        let mut r = Reassembler::new();
        let rows: Vec<_> = input
            .chars()
            .flat_map(|c| r.feed(c.encode_utf8(&mut [0; 4])))
            .collect();
        assert_eq!(texts(&rows), vec!["x,y", "z,w"]);
    }

    #[test]
    fn test_take_remainder() {
        let mut r = Reassembler::new();
        r.feed("a\nb,c");
        let trailing = r.take_remainder().unwrap();
        assert_eq!(trailing.line, 2);
        assert_eq!(trailing.bytes, 3);
        assert_eq!(trailing.text, "b,c");
        assert!(r.take_remainder().is_none());

        r.feed("\r");
        assert!(r.take_remainder().is_none());
    }
}
