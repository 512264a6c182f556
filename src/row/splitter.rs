//! Quote-aware field splitting.
//!
//! Delimiters inside a quoted span are hidden behind a sentinel character
//! before the row is split on the real delimiter, then restored in each
//! field. A quoted span runs from one quote character to the next; there is
//! no escaped-quote syntax, and a final unpaired quote opens no span.

use std::ops::Range;

/// Unicode noncharacters. They never appear in interchanged text, and one
/// that is absent from the row is picked as that row's sentinel.
fn sentinel_candidates() -> impl Iterator<Item = char> {
    ('\u{FDD0}'..='\u{FDEF}').chain(['\u{FFFE}', '\u{FFFF}'])
}

/// Byte ranges of the quoted spans in `row`, quotes included.
pub fn quoted_spans(row: &str, quote: char) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open = None;
    for (idx, ch) in row.char_indices() {
        if ch != quote {
            continue;
        }
        match open.take() {
            None => open = Some(idx),
            Some(start) => spans.push(start..idx + ch.len_utf8()),
        }
    }
    spans
}

/// Returns true if `row` has a quote character without a closing partner.
pub fn has_open_quote(row: &str, quote: char) -> bool {
    row.chars().filter(|&c| c == quote).count() % 2 == 1
}

/// A row whose quoted delimiters have been replaced by a sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRow {
    text: String,
    sentinel: char,
    delimiter: char,
}

impl ProtectedRow {
    /// Mask every delimiter inside a quoted span.
    ///
    /// Returns `None` when every sentinel candidate already occurs in the row.
    pub fn protect(row: &str, delimiter: char, quote: char) -> Option<Self> {
        let sentinel = sentinel_candidates().find(|c| !row.contains(*c))?;
        let spans = quoted_spans(row, quote);
        let mut spans = spans.iter().peekable();

        let mut text = String::with_capacity(row.len());
        for (idx, ch) in row.char_indices() {
            while spans.next_if(|span| span.end <= idx).is_some() {}
            let inside = spans.peek().is_some_and(|span| span.contains(&idx));
            text.push(if inside && ch == delimiter {
                sentinel
            } else {
                ch
            });
        }

        Some(Self {
            text,
            sentinel,
            delimiter,
        })
    }

    /// The masked text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Split on the real delimiter and restore the masked ones.
    pub fn split(&self) -> Vec<String> {
        self.text
            .split(self.delimiter)
            .map(|field| field.replace(self.sentinel, self.delimiter.encode_utf8(&mut [0; 4])))
            .collect()
    }
}

/// Split a candidate row into raw fields.
///
/// Trailing carriage returns are dropped first. Quote characters stay in the
/// returned fields, so joining them with `delimiter` gives back the row.
pub fn split_fields(row: &str, delimiter: char, quote: char) -> Vec<String> {
    let row = row.trim_end_matches('\r');
    match ProtectedRow::protect(row, delimiter, quote) {
        Some(protected) => protected.split(),
        None => scan_fields(row, delimiter, quote),
    }
}

/// Single-pass equivalent of masking, used when no sentinel is free.
fn scan_fields(row: &str, delimiter: char, quote: char) -> Vec<String> {
    let spans = quoted_spans(row, quote);
    let mut fields = Vec::new();
    let mut start = 0;
    for (idx, ch) in row.char_indices() {
        if ch == delimiter && !spans.iter().any(|span| span.contains(&idx)) {
            fields.push(row[start..idx].to_string());
            start = idx + ch.len_utf8();
        }
    }
    fields.push(row[start..].to_string());
    fields
}

/// Strip one enclosing pair of quotes from a field.
pub fn unquote(field: &str, quote: char) -> &str {
    field
        .strip_prefix(quote)
        .and_then(|rest| rest.strip_suffix(quote))
        .unwrap_or(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(row: &str) -> Vec<String> {
        split_fields(row, ',', '"')
    }

    #[test]
    fn test_plain_row() {
        assert_eq!(split("1,2,3"), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_quoted_delimiter_kept_in_field() {
        assert_eq!(split(r#"a,"b,c",d"#), vec!["a", r#""b,c""#, "d"]);
    }

    #[test]
    fn test_several_quoted_spans() {
        let fields = split(r#""Smith, John",MD,"Boston, MA","02110""#);
        assert_eq!(
            fields,
            vec![r#""Smith, John""#, "MD", r#""Boston, MA""#, r#""02110""#]
        );
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(split(",,"), vec!["", "", ""]);
        assert_eq!(split(r#"a,"",b"#), vec!["a", r#""""#, "b"]);
    }

    #[test]
    fn test_trailing_carriage_return_stripped() {
        assert_eq!(split("1,2,3\r"), vec!["1", "2", "3"]);
        assert_eq!(split("1,2,\r"), vec!["1", "2", ""]);
    }

    #[test]
    fn test_unpaired_quote_masks_nothing() {
        assert_eq!(split(r#"a,"b,c"#), vec!["a", r#""b"#, "c"]);
        assert!(has_open_quote(r#"a,"b,c"#, '"'));
        assert!(!has_open_quote(r#"a,"b,c""#, '"'));
    }

    #[test]
    fn test_span_is_shortest_match() {
        // First quote pairs with the second, third with the fourth.
        let fields = split(r#""x,y",z,"p,q""#);
        assert_eq!(fields, vec![r#""x,y""#, "z", r#""p,q""#]);
    }

    #[test]
    fn test_quoted_newline_preserved() {
        let fields = split("a,\"line one\nline, two\",c");
        assert_eq!(fields, vec!["a", "\"line one\nline, two\"", "c"]);
    }

    #[test]
    fn test_rejoin_round_trip() {
        for row in [
            r#"1,"a,b,c",,"x""#,
            r#""only,quoted""#,
            "no quotes at all",
            r#"é,"ü,ö",ß"#,
        ] {
            assert_eq!(split(row).join(","), row, "round trip failed for {row}");
        }
    }

    #[test]
    fn test_quoted_delimiters_do_not_add_fields() {
        let outside = 2;
        let row = r#"a,"1,2,3,4,5",b"#;
        assert_eq!(split(row).len(), outside + 1);
    }

    #[test]
    fn test_sentinel_avoids_characters_in_row() {
        let row = "a,\"b,\u{FDD0}\",c";
        let protected = ProtectedRow::protect(row, ',', '"').unwrap();
        assert_ne!(protected.sentinel, '\u{FDD0}');
        assert_eq!(
            protected.split(),
            vec!["a", "\"b,\u{FDD0}\"", "c"]
        );
    }

    #[test]
    fn test_scan_fallback_matches_masking() {
        let saturated: String = sentinel_candidates().collect();
        assert!(ProtectedRow::protect(&saturated, ',', '"').is_none());

        let row = format!("{saturated},\"x,y\",z");
        let fields = split(&row);
        assert_eq!(fields, vec![saturated.clone(), "\"x,y\"".to_string(), "z".to_string()]);

        for row in [r#"a,"b,c",d"#, r#"a,"b,c"#, ",,", r#""p,q""#] {
            let masked = ProtectedRow::protect(row, ',', '"').unwrap().split();
            assert_eq!(scan_fields(row, ',', '"'), masked, "mismatch for {row}");
        }
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""b,c""#, '"'), "b,c");
        assert_eq!(unquote(r#""""#, '"'), "");
        assert_eq!(unquote(r#"""#, '"'), r#"""#);
        assert_eq!(unquote(r#""open"#, '"'), r#""open"#);
        assert_eq!(unquote("plain", '"'), "plain");
    }
}
