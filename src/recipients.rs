//! Recipient list normalization.
//!
//! Recipients arrive as raw tokens, one per `--toEmail` flag (or list
//! entry), and each token may itself hold several comma-separated
//! addresses. The first address of every token keeps its token position;
//! the overflow addresses are appended afterwards, grouped by token.

use std::fmt;

/// Ordered list of trimmed, comma-free recipient addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// Normalize raw recipient tokens.
    ///
    /// ```
    /// use incident_mailer::Recipients;
    ///
    /// let tokens = [" a@x.com\r\n, b@x.com", "c@x.com"];
    /// let recipients = Recipients::from_tokens(&tokens);
    /// assert_eq!(recipients.to_string(), "a@x.com,c@x.com,b@x.com");
    /// ```
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut primary = Vec::with_capacity(tokens.len());
        let mut secondary = Vec::new();

        for token in tokens {
            let mut pieces = token.as_ref().split(',').map(str::trim);
            // split always yields at least one piece
            if let Some(first) = pieces.next() {
                primary.push(first.to_string());
            }
            secondary.extend(pieces.map(String::from));
        }

        primary.extend(secondary);
        Self(primary)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Comma-joined form used for the `To` header.
impl fmt::Display for Recipients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}
