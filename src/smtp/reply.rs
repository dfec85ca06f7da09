//! Server replies and EHLO extensions.

use crate::error::SmtpError;
use std::fmt;

/// One (possibly multi-line) server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

/// Outcome of parsing a single reply line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ReplyLine<'a> {
    pub code: u16,
    pub last: bool,
    pub text: &'a str,
}

impl<'a> ReplyLine<'a> {
    /// Parse `250-text`, `250 text` or a bare `250`.
    pub fn parse(line: &'a str) -> Result<Self, SmtpError> {
        let malformed = || SmtpError::MalformedReply(line.to_string());

        let digits = line.get(..3).ok_or_else(malformed)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let code: u16 = digits.parse().map_err(|_| malformed())?;

        match line.as_bytes().get(3) {
            None => Ok(Self {
                code,
                last: true,
                text: "",
            }),
            Some(b' ') => Ok(Self {
                code,
                last: true,
                text: &line[4..],
            }),
            Some(b'-') => Ok(Self {
                code,
                last: false,
                text: &line[4..],
            }),
            Some(_) => Err(malformed()),
        }
    }
}

impl Reply {
    /// Assemble a reply from raw lines (terminators already stripped).
    pub fn from_lines<S: AsRef<str>>(raw: &[S]) -> Result<Self, SmtpError> {
        let mut code = None;
        let mut lines = Vec::with_capacity(raw.len());

        for line in raw {
            let parsed = ReplyLine::parse(line.as_ref())?;
            match code {
                None => code = Some(parsed.code),
                Some(c) if c != parsed.code => {
                    return Err(SmtpError::MalformedReply(format!(
                        "mixed reply codes {} and {}",
                        c, parsed.code
                    )));
                }
                Some(_) => {}
            }
            lines.push(parsed.text.to_string());
        }

        let code = code.ok_or_else(|| SmtpError::MalformedReply("empty reply".to_string()))?;
        Ok(Self { code, lines })
    }

    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Reply text with lines joined by a space.
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }

    /// Error for a reply that did not carry the expected code.
    pub fn rejected(&self, stage: &'static str) -> SmtpError {
        SmtpError::Rejected {
            stage,
            code: self.code,
            message: self.text(),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

/// Service extensions advertised in the EHLO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    pub starttls: bool,
    pub eight_bit_mime: bool,
    /// `None` when AUTH is not advertised at all.
    pub auth: Option<Vec<String>>,
}

impl Extensions {
    /// Parse the EHLO reply; the first line is the server greeting.
    pub fn from_ehlo(reply: &Reply) -> Self {
        let mut extensions = Self::default();
        for line in reply.lines.iter().skip(1) {
            let mut words = line.split_whitespace();
            let Some(keyword) = words.next() else {
                continue;
            };
            match keyword.to_ascii_uppercase().as_str() {
                "STARTTLS" => extensions.starttls = true,
                "8BITMIME" => extensions.eight_bit_mime = true,
                "AUTH" => {
                    extensions.auth = Some(words.map(|m| m.to_ascii_uppercase()).collect());
                }
                _ => {}
            }
        }
        extensions
    }

    pub fn supports_auth(&self) -> bool {
        self.auth.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_line_reply() {
        let reply = Reply::from_lines(&["220 mx.example.com ESMTP ready"]).unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.text(), "mx.example.com ESMTP ready");
        assert!(reply.is_positive());
    }

    #[test]
    fn parse_multi_line_reply() {
        let reply = Reply::from_lines(&[
            "250-mx.example.com",
            "250-STARTTLS",
            "250 AUTH PLAIN LOGIN",
        ])
        .unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.lines, ["mx.example.com", "STARTTLS", "AUTH PLAIN LOGIN"]);
    }

    #[test]
    fn parse_bare_code() {
        let line = ReplyLine::parse("354").unwrap();
        assert_eq!(line.code, 354);
        assert!(line.last);
        assert_eq!(line.text, "");
    }

    #[test]
    fn continuation_marker_is_detected() {
        assert!(!ReplyLine::parse("250-PIPELINING").unwrap().last);
        assert!(ReplyLine::parse("250 PIPELINING").unwrap().last);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(ReplyLine::parse("ok").is_err());
        assert!(ReplyLine::parse("2x0 hello").is_err());
        assert!(ReplyLine::parse("250+hello").is_err());
        assert!(Reply::from_lines::<&str>(&[]).is_err());
    }

    #[test]
    fn mixed_codes_are_rejected() {
        let err = Reply::from_lines(&["250-a", "251 b"]).unwrap_err();
        assert!(matches!(err, SmtpError::MalformedReply(_)));
    }

    #[test]
    fn rejected_carries_stage_and_text() {
        let reply = Reply::from_lines(&["550 5.1.1 no such user"]).unwrap();
        let err = reply.rejected("RCPT TO");
        assert_eq!(err.to_string(), "RCPT TO rejected (550): 5.1.1 no such user");
    }

    #[test]
    fn extensions_from_ehlo() {
        let reply = Reply::from_lines(&[
            "250-mx.example.com greets localhost",
            "250-8BITMIME",
            "250-starttls",
            "250 AUTH login Plain",
        ])
        .unwrap();
        let ext = Extensions::from_ehlo(&reply);
        assert!(ext.starttls);
        assert!(ext.eight_bit_mime);
        assert_eq!(ext.auth, Some(vec!["LOGIN".to_string(), "PLAIN".to_string()]));
    }

    #[test]
    fn extensions_greeting_line_is_not_a_keyword() {
        let reply = Reply::from_lines(&["250 STARTTLS"]).unwrap();
        let ext = Extensions::from_ehlo(&reply);
        assert!(!ext.starttls);
        assert!(!ext.supports_auth());
    }
}
