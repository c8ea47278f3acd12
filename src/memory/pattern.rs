//! SQL `LIKE` patterns (`%` any run, `_` one character).
//!
//! A pattern is translated into an anchored regex once per query, so
//! matching a record is linear in the length of its value.

use regex::Regex;

/// A compiled `LIKE` pattern
#[derive(Debug, Clone)]
pub struct LikePattern {
    regex: Regex,
}

impl LikePattern {
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let mut source = String::with_capacity(pattern.len() * 2 + 8);
        source.push_str(if case_insensitive { "(?is)^" } else { "(?s)^" });
        let mut buf = [0u8; 4];
        for c in pattern.chars() {
            match c {
                '%' => source.push_str(".*"),
                '_' => source.push('.'),
                _ => source.push_str(&regex::escape(c.encode_utf8(&mut buf))),
            }
        }
        source.push('$');
        Ok(Self {
            regex: Regex::new(&source)?,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}
