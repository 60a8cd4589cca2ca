//! Permissive parser for the literal syntax some services log instead of
//! JSON, e.g. `{'level': 'info', 'ok': True, 'tags': ('a', 'b')}`.
//!
//! Accepted: dicts, lists, tuples (as arrays), single- or double-quoted
//! strings with optional `u`/`r` prefixes, bare identifier keys, integers of
//! any size, floats, `True`/`False`/`None` and their JSON spellings. Nothing
//! is evaluated.

use serde_json::{Map, Number, Value};
use thiserror::Error;

const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ParseError {
    #[error("unexpected end of input")]
    Eof,
    #[error("unexpected {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("invalid escape at offset {offset}")]
    Escape { offset: usize },
    #[error("invalid number {0:?}")]
    Number(String),
    #[error("nesting too deep")]
    TooDeep,
}

pub(crate) fn parse(input: &str) -> Result<Value, ParseError> {
    let mut parser = Parser { src: input, pos: 0 };
    let value = parser.value(0)?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok(value),
        Some(found) => Err(parser.unexpected(found)),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.bump();
        }
    }

    fn unexpected(&self, found: char) -> ParseError {
        ParseError::Unexpected {
            found,
            offset: self.pos,
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        self.skip_ws();
        match self.bump() {
            Some(ch) if ch == wanted => Ok(()),
            Some(ch) => {
                self.pos -= ch.len_utf8();
                Err(self.unexpected(ch))
            }
            None => Err(ParseError::Eof),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, ParseError> {
        if depth > MAX_DEPTH {
            return Err(ParseError::TooDeep);
        }

        self.skip_ws();
        match self.peek().ok_or(ParseError::Eof)? {
            '{' => self.dict(depth),
            '[' => self.sequence(']', depth).map(|(items, _)| Value::Array(items)),
            '(' => self.tuple(depth),
            '\'' | '"' => self.string(false).map(Value::String),
            _ if self.at_prefixed_string() => self.prefixed_string().map(Value::String),
            ch if ch == '-' || ch == '+' || ch.is_ascii_digit() => self.number(),
            ch if is_ident_start(ch) => {
                let start = self.pos;
                let word = self.ident();
                keyword(word).ok_or(ParseError::Unexpected {
                    found: ch,
                    offset: start,
                })
            }
            other => Err(self.unexpected(other)),
        }
    }

    fn dict(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.expect('{')?;
        let mut map = Map::new();

        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }

            let key = self.key()?;
            self.expect(':')?;
            let value = self.value(depth + 1)?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(ch) => {
                    self.pos -= ch.len_utf8();
                    return Err(self.unexpected(ch));
                }
                None => return Err(ParseError::Eof),
            }
        }
    }

    /// Keys end up as JSON object keys, so scalars are stringified the way
    /// `json.dumps` would do it.
    fn key(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        match self.peek().ok_or(ParseError::Eof)? {
            '\'' | '"' => self.string(false),
            _ if self.at_prefixed_string() => self.prefixed_string(),
            ch if ch == '-' || ch == '+' || ch.is_ascii_digit() => {
                self.number().map(|number| number.to_string())
            }
            ch if is_ident_start(ch) => {
                let word = self.ident();
                Ok(keyword(word)
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| word.to_owned()))
            }
            other => Err(self.unexpected(other)),
        }
    }

    /// Parses comma separated items up to `close`. Also reports whether a
    /// comma was seen, which tells a tuple from a parenthesized value.
    fn sequence(&mut self, close: char, depth: usize) -> Result<(Vec<Value>, bool), ParseError> {
        self.bump();
        let mut items = Vec::new();
        let mut saw_comma = false;

        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok((items, saw_comma));
            }

            items.push(self.value(depth + 1)?);

            self.skip_ws();
            match self.bump() {
                Some(',') => saw_comma = true,
                Some(ch) if ch == close => return Ok((items, saw_comma)),
                Some(ch) => {
                    self.pos -= ch.len_utf8();
                    return Err(self.unexpected(ch));
                }
                None => return Err(ParseError::Eof),
            }
        }
    }

    fn tuple(&mut self, depth: usize) -> Result<Value, ParseError> {
        let (mut items, saw_comma) = self.sequence(')', depth)?;
        if items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::Array(items))
    }

    /// `u'..'`, `r'..'` and their upper-case spellings.
    fn at_prefixed_string(&self) -> bool {
        let mut chars = self.src[self.pos..].chars();
        matches!(
            (chars.next(), chars.next()),
            (Some('u' | 'U' | 'r' | 'R'), Some('\'' | '"'))
        )
    }

    fn prefixed_string(&mut self) -> Result<String, ParseError> {
        let raw = matches!(self.bump(), Some('r' | 'R'));
        self.string(raw)
    }

    fn string(&mut self, raw: bool) -> Result<String, ParseError> {
        let quote = self.bump().ok_or(ParseError::Eof)?;
        let mut out = String::new();

        loop {
            let offset = self.pos;
            match self.bump().ok_or(ParseError::Eof)? {
                ch if ch == quote => return Ok(out),
                '\n' => {
                    return Err(ParseError::Unexpected {
                        found: '\n',
                        offset,
                    });
                }
                // A backslash still protects the quote in raw strings, but
                // both characters are kept.
                '\\' if raw => {
                    out.push('\\');
                    out.push(self.bump().ok_or(ParseError::Eof)?);
                }
                '\\' => self.escape(offset, &mut out)?,
                ch => out.push(ch),
            }
        }
    }

    /// Unknown escapes keep their backslash, as Python does.
    fn escape(&mut self, offset: usize, out: &mut String) -> Result<(), ParseError> {
        let escaped = match self.bump().ok_or(ParseError::Eof)? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '\n' => return Ok(()),
            first @ '0'..='7' => self.octal(first, offset)?,
            'x' => self.hex(2, offset)?,
            'u' => self.hex(4, offset)?,
            'U' => self.hex(8, offset)?,
            other => {
                out.push('\\');
                other
            }
        };
        out.push(escaped);
        Ok(())
    }

    /// Up to three octal digits, the first already consumed.
    fn octal(&mut self, first: char, offset: usize) -> Result<char, ParseError> {
        let mut code = first.to_digit(8).ok_or(ParseError::Escape { offset })?;
        for _ in 0..2 {
            match self.peek().and_then(|ch| ch.to_digit(8)) {
                Some(digit) => {
                    code = code * 8 + digit;
                    self.bump();
                }
                None => break,
            }
        }
        char::from_u32(code).ok_or(ParseError::Escape { offset })
    }

    fn hex(&mut self, digits: usize, offset: usize) -> Result<char, ParseError> {
        let end = self.pos + digits;
        let raw = self
            .src
            .get(self.pos..end)
            .ok_or(ParseError::Escape { offset })?;
        let code = u32::from_str_radix(raw, 16).map_err(|_| ParseError::Escape { offset })?;
        self.pos = end;
        char::from_u32(code).ok_or(ParseError::Escape { offset })
    }

    fn number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }

        let mut is_float = false;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => {}
                '.' | 'e' | 'E' => is_float = true,
                '-' | '+' if matches!(self.src[..self.pos].chars().last(), Some('e' | 'E')) => {}
                _ => break,
            }
            self.bump();
        }

        let raw = &self.src[start..self.pos];
        let digits = raw.strip_prefix('+').unwrap_or(raw);
        let invalid = || ParseError::Number(raw.to_owned());

        if !is_float {
            if let Ok(int) = digits.parse::<i64>() {
                return Ok(Value::Number(int.into()));
            }
            if let Ok(int) = digits.parse::<u64>() {
                return Ok(Value::Number(int.into()));
            }
            if let Ok(big) = serde_json::from_str::<Number>(digits) {
                return Ok(Value::Number(big));
            }
        }

        digits
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid)
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_alphanumeric() || ch == '_') {
            self.bump();
        }
        &self.src[start..self.pos]
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn keyword(word: &str) -> Option<Value> {
    match word {
        "True" | "true" => Some(Value::Bool(true)),
        "False" | "false" => Some(Value::Bool(false)),
        "None" | "null" => Some(Value::Null),
        _ => None,
    }
}
