//! Rewrites the mongo shell JSON dialect into canonical extended JSON.
//!
//! Criteria typed by users and files written by older tools often contain
//! constructor calls (`ObjectId("...")`, `ISODate("...")`, `NumberLong(5)`),
//! single-quoted strings and bare keys. None of that is JSON, so before the
//! text reaches `serde_json` it is scanned once and every such construct is
//! replaced by its extended JSON equivalent. Text inside double-quoted
//! strings is copied untouched.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{NaiveDate, NaiveDateTime};
use mongodb::bson::{DateTime, oid::ObjectId};

use crate::error::{ParseError, ParseErrorKind};

/// A literal argument of a shell constructor call.
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Num(String),
}

impl Arg {
    fn text(&self) -> &str {
        match self {
            Arg::Str(s) | Arg::Num(s) => s,
        }
    }
}

/// Rewrite shell-dialect text into JSON that `serde_json` accepts.
///
/// Plain JSON passes through unchanged.
pub fn normalize(input: &str) -> Result<String, ParseError> {
    Scanner::new(input).run()
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    input: &'a str,
    out: String,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            input,
            out: String::with_capacity(input.len()),
        }
    }

    fn run(mut self) -> Result<String, ParseError> {
        while let Some(&(pos, c)) = self.chars.peek() {
            match c {
                '"' => {
                    let s = self.read_double_quoted()?;
                    self.out.push_str(&s);
                }
                '\'' => {
                    let s = self.read_single_quoted()?;
                    self.out.push_str(&quote(&s));
                }
                c if is_ident_start(c) => {
                    let word = self.read_ident(pos);
                    self.rewrite_word(word)?;
                }
                _ => {
                    self.out.push(c);
                    self.chars.next();
                }
            }
        }
        Ok(self.out)
    }

    fn rewrite_word(&mut self, word: &'a str) -> Result<(), ParseError> {
        if word == "new" {
            self.skip_whitespace();
            let Some(&(pos, c)) = self.chars.peek() else {
                return Err(constructor_error("`new` must be followed by a constructor"));
            };
            if !is_ident_start(c) {
                return Err(constructor_error("`new` must be followed by a constructor"));
            }
            let name = self.read_ident(pos);
            return self.rewrite_constructor(name, true);
        }

        if is_constructor(word) && self.next_non_whitespace() == Some('(') {
            return self.rewrite_constructor(word, false);
        }

        if matches!(word, "true" | "false" | "null") {
            self.out.push_str(word);
        } else if self.next_non_whitespace() == Some(':') {
            // bare object key
            self.out.push_str(&quote(word));
        } else {
            self.out.push_str(word);
        }
        Ok(())
    }

    fn rewrite_constructor(&mut self, name: &str, with_new: bool) -> Result<(), ParseError> {
        if !is_constructor(name) {
            return Err(constructor_error(format!("unknown constructor `{name}`")));
        }
        self.skip_whitespace();
        if self.chars.next().map(|(_, c)| c) != Some('(') {
            return Err(constructor_error(format!("expected `(` after `{name}`")));
        }
        let args = self.read_args(name)?;
        let json = build_constructor(name, with_new, &args)?;
        self.out.push_str(&json);
        Ok(())
    }

    fn read_args(&mut self, name: &str) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&(pos, c)) = self.chars.peek() else {
                return Err(constructor_error(format!("unterminated `{name}(`")));
            };
            match c {
                ')' => {
                    self.chars.next();
                    return Ok(args);
                }
                ',' if !args.is_empty() => {
                    self.chars.next();
                }
                '"' => {
                    let raw = self.read_double_quoted()?;
                    let value: String = serde_json::from_str(&raw)
                        .map_err(|e| ParseError::invalid_json(e.to_string()))?;
                    args.push(Arg::Str(value));
                }
                '\'' => args.push(Arg::Str(self.read_single_quoted()?)),
                c if c == '-' || c == '+' || c.is_ascii_digit() => {
                    args.push(Arg::Num(self.read_number(pos)));
                }
                other => {
                    return Err(constructor_error(format!(
                        "unexpected `{other}` in arguments of `{name}`"
                    )));
                }
            }
        }
    }

    /// Returns the raw literal including its quotes.
    fn read_double_quoted(&mut self) -> Result<String, ParseError> {
        let mut s = String::new();
        if let Some((_, q)) = self.chars.next() {
            s.push(q);
        }
        let mut escaped = false;
        for (_, c) in self.chars.by_ref() {
            s.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                return Ok(s);
            }
        }
        Err(ParseError::invalid_json("unterminated string"))
    }

    /// Returns the unescaped content of a single-quoted literal.
    fn read_single_quoted(&mut self) -> Result<String, ParseError> {
        self.chars.next();
        let mut s = String::new();
        let mut escaped = false;
        for (_, c) in self.chars.by_ref() {
            if escaped {
                s.push(match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' {
                return Ok(s);
            } else {
                s.push(c);
            }
        }
        Err(ParseError::invalid_json("unterminated string"))
    }

    fn read_ident(&mut self, start: usize) -> &'a str {
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if pos == start || is_ident_continue(c) {
                end = pos + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let input = self.input;
        &input[start..end]
    }

    fn read_number(&mut self, start: usize) -> String {
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if pos == start || c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+') {
                end = pos + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        self.input[start..end].trim_start_matches('+').to_string()
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.chars.next();
        }
    }

    fn next_non_whitespace(&self) -> Option<char> {
        self.chars.clone().map(|(_, c)| c).find(|c| !c.is_whitespace())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_constructor(name: &str) -> bool {
    matches!(
        name,
        "ObjectId"
            | "ISODate"
            | "Date"
            | "NumberLong"
            | "NumberInt"
            | "NumberDecimal"
            | "Timestamp"
            | "BinData"
    )
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn constructor_error(message: impl Into<String>) -> ParseError {
    ParseError::new(ParseErrorKind::InvalidShellConstructor, message)
}

fn build_constructor(name: &str, with_new: bool, args: &[Arg]) -> Result<String, ParseError> {
    match (name, args) {
        ("ObjectId", []) => Ok(oid_json(&ObjectId::new().to_hex())),
        ("ObjectId", [Arg::Str(hex)]) => {
            let oid = ObjectId::parse_str(hex)
                .map_err(|e| constructor_error(format!("ObjectId(\"{hex}\"): {e}")))?;
            Ok(oid_json(&oid.to_hex()))
        }
        ("ISODate", []) => Ok(date_json(DateTime::now())),
        ("Date", []) if with_new => Ok(date_json(DateTime::now())),
        ("ISODate" | "Date", [Arg::Str(text)]) => parse_date(text).map(date_json),
        ("ISODate" | "Date", [Arg::Num(millis)]) => millis
            .parse::<i64>()
            .map(|ms| date_json(DateTime::from_millis(ms)))
            .map_err(|_| constructor_error(format!("{name}({millis}): not an integer"))),
        ("NumberLong", [arg]) => {
            let text = arg.text();
            text.trim()
                .parse::<i64>()
                .map(|n| format!(r#"{{"$numberLong":"{n}"}}"#))
                .map_err(|_| constructor_error(format!("NumberLong({text}): not a 64-bit integer")))
        }
        ("NumberInt", [arg]) => {
            let text = arg.text();
            text.trim()
                .parse::<i32>()
                .map(|n| format!(r#"{{"$numberInt":"{n}"}}"#))
                .map_err(|_| constructor_error(format!("NumberInt({text}): not a 32-bit integer")))
        }
        ("NumberDecimal", [arg]) => Ok(format!(
            r#"{{"$numberDecimal":{}}}"#,
            quote(arg.text().trim())
        )),
        ("Timestamp", [Arg::Num(t), Arg::Num(i)]) => {
            let (t, i) = t
                .parse::<u32>()
                .ok()
                .zip(i.parse::<u32>().ok())
                .ok_or_else(|| constructor_error("Timestamp(t, i): expected two unsigned integers"))?;
            Ok(format!(r#"{{"$timestamp":{{"t":{t},"i":{i}}}}}"#))
        }
        ("BinData", [Arg::Num(subtype), Arg::Str(data)]) => {
            let subtype = subtype
                .parse::<u8>()
                .map_err(|_| constructor_error(format!("BinData({subtype}, ...): bad subtype")))?;
            BASE64
                .decode(data)
                .map_err(|e| constructor_error(format!("BinData payload: {e}")))?;
            Ok(format!(
                r#"{{"$binary":{{"base64":{},"subType":"{subtype:02x}"}}}}"#,
                quote(data)
            ))
        }
        _ => Err(constructor_error(format!(
            "unsupported arguments for `{name}`: {args:?}"
        ))),
    }
}

fn oid_json(hex: &str) -> String {
    format!(r#"{{"$oid":"{hex}"}}"#)
}

fn date_json(dt: DateTime) -> String {
    format!(r#"{{"$date":{{"$numberLong":"{}"}}}}"#, dt.timestamp_millis())
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DDTHH:MM:SS` without zone (UTC),
/// and bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_date(text: &str) -> Result<DateTime, ParseError> {
    if let Ok(dt) = DateTime::parse_rfc3339_str(text) {
        return Ok(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(DateTime::from_millis(naive.and_utc().timestamp_millis()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(DateTime::from_millis(midnight.and_utc().timestamp_millis()));
        }
    }
    Err(constructor_error(format!("ISODate(\"{text}\"): unrecognised date")))
}
