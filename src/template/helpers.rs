//! Helper filters and functions available to templates.
//!
//! Every helper is registered both as a filter (`{{ Check.Output | split_lines }}`)
//! and, where it reads naturally, as a function (`{{ unix_time(Check.Executed) }}`).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use minijinja::value::{Enumerator, Object, ObjectRepr, Value, from_args};
use minijinja::{Environment, Error, ErrorKind, State};
use std::fmt::{self, Write};
use std::sync::Arc;

/// Default rendering of a timestamp when no pattern is given.
const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Register all helpers on an environment.
pub(crate) fn register(env: &mut Environment<'static>) {
    env.add_function("unix_time", unix_time);
    env.add_filter("unix_time", unix_time);

    env.add_function("split", split);
    env.add_filter("split", split);

    env.add_function("split_lines", split_lines);
    env.add_filter("split_lines", split_lines);

    env.add_function("trim_prefix", trim_prefix);
    env.add_filter("trim_prefix", trim_prefix);

    env.add_function("div", div);
    env.add_filter("div", div);
}

/// Point in time exposed to templates, formattable with strftime patterns.
#[derive(Debug, Clone)]
pub struct Timestamp(DateTime<Tz>);

impl Timestamp {
    fn format(&self, pattern: &str) -> Result<String, Error> {
        let mut out = String::new();
        write!(out, "{}", self.0.format(pattern)).map_err(|_| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("invalid time format '{}'", pattern),
            )
        })?;
        Ok(out)
    }

    fn in_tz(&self, name: &str) -> Result<Timestamp, Error> {
        let tz: Tz = name.parse().map_err(|_| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("unknown timezone '{}'", name),
            )
        })?;
        Ok(Timestamp(self.0.with_timezone(&tz)))
    }
}

impl Object for Timestamp {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "format" => {
                let (pattern,): (&str,) = from_args(args)?;
                self.format(pattern).map(Value::from)
            }
            "in_tz" => {
                let (name,): (&str,) = from_args(args)?;
                self.in_tz(name).map(Value::from_object)
            }
            "unix" => {
                from_args::<()>(args)?;
                Ok(Value::from(self.0.timestamp()))
            }
            _ => Err(Error::from(ErrorKind::UnknownMethod)),
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DEFAULT_TIME_FORMAT))
    }
}

/// Convert epoch seconds into a timestamp (UTC until `in_tz` is applied).
fn unix_time(seconds: i64) -> Result<Value, Error> {
    let utc = DateTime::<Utc>::from_timestamp(seconds, 0).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("timestamp {} is out of range", seconds),
        )
    })?;
    Ok(Value::from_object(Timestamp(
        utc.with_timezone(&chrono_tz::UTC),
    )))
}

/// Result of `split`: a sequence that also answers `_0`, `_1`, ... lookups.
#[derive(Debug)]
struct Parts(Vec<String>);

impl Object for Parts {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Seq
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let index = match key.as_str() {
            Some(name) => name.strip_prefix('_')?.parse::<usize>().ok()?,
            None => key.as_usize()?,
        };
        self.0.get(index).map(|part| Value::from(part.as_str()))
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Seq(self.0.len())
    }
}

fn split(value: String, separator: String) -> Value {
    let parts = value.split(separator.as_str()).map(String::from).collect();
    Value::from_object(Parts(parts))
}

/// Lines of a string; `\n` and `\r\n` terminators are stripped and a
/// final terminator does not produce an empty trailing line.
fn split_lines(value: String) -> Vec<String> {
    value.lines().map(String::from).collect()
}

fn trim_prefix(value: String, prefix: String) -> String {
    match value.strip_prefix(prefix.as_str()) {
        Some(rest) => rest.to_string(),
        None => value,
    }
}

/// Integer division truncating toward zero.
fn div(dividend: i64, divisor: i64) -> Result<i64, Error> {
    dividend.checked_div(divisor).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot divide {} by {}", dividend, divisor),
        )
    })
}
