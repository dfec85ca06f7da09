//! Content-type detection and wire message composition.

use crate::recipients::Recipients;
use crate::template::RenderedMessage;
use chrono::{DateTime, TimeZone};
use std::borrow::Cow;
use std::fmt;

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Marker that switches a body template to HTML mode.
const HTML_MARKER: &str = "<html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Plain,
    Html,
}

impl ContentType {
    /// Inspect an unrendered body template source.
    ///
    /// The match is case-sensitive and covers both `<html>` and
    /// `<html lang="en">`.
    pub fn detect(body_template: &str) -> Self {
        if body_template.contains(HTML_MARKER) {
            ContentType::Html
        } else {
            ContentType::Plain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Plain => "text/plain",
            ContentType::Html => "text/html",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the message handed to `DATA`.
///
/// Headers come in a fixed order (From, To, Subject, Date, Content-Type),
/// each CRLF-terminated, followed by a blank line, the body and a final CRLF.
/// Line breaks inside the From and Subject values are flattened to spaces.
pub fn compose<Tz>(
    from_header: &str,
    recipients: &Recipients,
    message: &RenderedMessage,
    date: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!(
        "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nContent-Type: {}\r\n\r\n{}\r\n",
        header_value(from_header),
        recipients,
        header_value(&message.subject),
        date.format(DATE_FORMAT),
        message.content_type.as_str(),
        message.body,
    )
}

/// Collapse every run of CR/LF characters into a single space.
fn header_value(value: &str) -> Cow<'_, str> {
    if !value.contains(['\r', '\n']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len());
    let mut in_break = false;
    for c in value.chars() {
        if c == '\r' || c == '\n' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }
    Cow::Owned(out)
}
