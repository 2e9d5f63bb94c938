// ABOUTME: Identifier quoting for SQL text interpolation
// ABOUTME: A Quoter value is passed explicitly to every component that embeds names in SQL

use std::fmt;

/// Quotes identifiers before they are embedded in SQL text.
///
/// A single `Quoter` is injected into the schema reader, the schema applier,
/// and the row applier so every interpolated name goes through the same
/// escaping. Escaping doubles the quote character; this keeps reserved words
/// (`"index"`, `"order"`) usable as table or column names. Both databases are
/// assumed trusted, so this is consistency plumbing rather than a defense
/// against adversarial input.
///
/// # Examples
///
/// ```
/// use sqlite_mirror::quoting::Quoter;
/// let q = Quoter::default();
/// assert_eq!(q.ident("users"), "\"users\"");
/// assert_eq!(q.ident("we\"ird"), "\"we\"\"ird\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quoter {
    quote: char,
}

impl Default for Quoter {
    /// Standard SQL double-quote, the SQLite default.
    fn default() -> Self {
        Self { quote: '"' }
    }
}

impl Quoter {
    /// Create a quoter using a custom quote character (e.g. '`' for
    /// MySQL-compatible dialects).
    pub fn new(quote: char) -> Self {
        Self { quote }
    }

    /// Quote an identifier, doubling any embedded quote characters.
    pub fn ident(&self, identifier: &str) -> String {
        let mut quoted = String::with_capacity(identifier.len() + 2);
        quoted.push(self.quote);
        for ch in identifier.chars() {
            if ch == self.quote {
                quoted.push(self.quote);
            }
            quoted.push(ch);
        }
        quoted.push(self.quote);
        quoted
    }
}

impl fmt::Display for Quoter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quoter({})", self.quote)
    }
}
