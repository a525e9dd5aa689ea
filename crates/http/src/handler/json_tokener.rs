//! Incremental JSON tokenizer
//!
//! [`JsonTokener`] accepts a JSON document in arbitrary byte chunks and assembles
//! a [`serde_json::Value`] as it goes, without buffering the raw input. Only one
//! top-level value is accepted; anything but whitespace after it is an error.
//!
//! Strings are collected byte by byte, escapes (including surrogate pairs) are
//! resolved as soon as they are complete and the result must be valid UTF-8.
//! Numbers are gathered until the first byte that cannot continue them and then
//! validated by `serde_json`.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::ensure;

/// Default maximum nesting of arrays and objects.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenerError {
    #[error("unexpected byte {byte:#04x} at offset {offset}")]
    UnexpectedByte { byte: u8, offset: usize },

    #[error("nesting exceeds {max_depth} levels")]
    TooDeep { max_depth: usize },

    #[error("invalid number at offset {offset}")]
    InvalidNumber { offset: usize },

    #[error("invalid string at offset {offset}")]
    InvalidString { offset: usize },

    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },

    #[error("unexpected data after the value at offset {offset}")]
    TrailingData { offset: usize },

    #[error("unexpected end of input")]
    Incomplete,

    #[error("tokener halted by an earlier error")]
    Halted,
}

#[derive(Debug)]
enum Frame {
    Array(Vec<Value>),
    /// Members so far and the key waiting for its value.
    Object(Map<String, Value>, Option<String>),
}

#[derive(Debug)]
enum State {
    /// Expecting any value.
    Value,
    /// Right after `[`: a value or `]`.
    ArrayFirst,
    /// Right after `{`: a key or `}`.
    ObjectFirst,
    /// After `,` inside an object.
    ObjectKey,
    Colon,
    /// After a value inside a container: `,` or the closing bracket.
    AfterValue,
    Str(StrState),
    Number(String),
    Literal { word: &'static [u8], matched: usize },
    /// The top-level value is complete.
    Done,
    Failed,
}

#[derive(Debug, Default)]
struct StrState {
    buf: Vec<u8>,
    key: bool,
    escape: Escape,
    high_surrogate: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy)]
enum Escape {
    #[default]
    None,
    Backslash,
    Unicode { digits: u8, code: u32 },
}

#[derive(Debug)]
pub struct JsonTokener {
    stack: Vec<Frame>,
    state: State,
    result: Option<Value>,
    max_depth: usize,
    offset: usize,
}

impl Default for JsonTokener {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonTokener {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { stack: Vec::new(), state: State::Value, result: None, max_depth, offset: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Feeds the next chunk of the document.
    ///
    /// After the first error the tokener is halted and rejects further input.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), TokenerError> {
        for &byte in chunk {
            if let Err(e) = self.consume(byte) {
                self.state = State::Failed;
                return Err(e);
            }
            self.offset += 1;
        }
        Ok(())
    }

    /// Ends the input.
    ///
    /// Returns `Ok(None)` when nothing but whitespace was fed, and an error when
    /// the document stopped in the middle of a value.
    pub fn finish(&mut self) -> Result<Option<Value>, TokenerError> {
        if matches!(self.state, State::Number(_)) {
            if let Err(e) = self.end_number() {
                self.state = State::Failed;
                return Err(e);
            }
        }

        match self.state {
            State::Done => Ok(self.result.take()),
            State::Value if self.stack.is_empty() => Ok(None),
            State::Failed => Err(TokenerError::Halted),
            _ => {
                self.state = State::Failed;
                Err(TokenerError::Incomplete)
            }
        }
    }

    fn consume(&mut self, byte: u8) -> Result<(), TokenerError> {
        let offset = self.offset;

        // a number ends at the first byte that cannot continue it
        if let State::Number(digits) = &mut self.state {
            if is_number_byte(byte) {
                digits.push(char::from(byte));
                return Ok(());
            }
            self.end_number()?;
        }

        if let State::Str(string) = &mut self.state {
            if !string.push(byte, offset)? {
                return Ok(());
            }
            let StrState { buf, key, .. } = std::mem::take(string);
            let text = String::from_utf8(buf).map_err(|_e| TokenerError::InvalidString { offset })?;
            if key {
                self.set_key(text);
            } else {
                self.emit(Value::String(text));
            }
            return Ok(());
        }

        if let State::Literal { word, matched } = &mut self.state {
            ensure!(word.get(*matched) == Some(&byte), TokenerError::UnexpectedByte { byte, offset });
            *matched += 1;
            if *matched < word.len() {
                return Ok(());
            }
            let value = match *word {
                b"true" => Value::Bool(true),
                b"false" => Value::Bool(false),
                _ => Value::Null,
            };
            self.emit(value);
            return Ok(());
        }

        if is_whitespace(byte) && !matches!(self.state, State::Failed) {
            return Ok(());
        }

        match self.state {
            State::Value => self.begin_value(byte),
            State::ArrayFirst if byte == b']' => self.close(byte),
            State::ArrayFirst => self.begin_value(byte),
            State::ObjectFirst if byte == b'}' => self.close(byte),
            State::ObjectFirst | State::ObjectKey if byte == b'"' => {
                self.state = State::Str(StrState { key: true, ..StrState::default() });
                Ok(())
            }
            State::Colon if byte == b':' => {
                self.state = State::Value;
                Ok(())
            }
            State::AfterValue if byte == b',' => self.next_element(byte),
            State::AfterValue if byte == b']' || byte == b'}' => self.close(byte),
            State::Done => Err(TokenerError::TrailingData { offset }),
            State::Failed => Err(TokenerError::Halted),
            _ => Err(TokenerError::UnexpectedByte { byte, offset }),
        }
    }

    fn begin_value(&mut self, byte: u8) -> Result<(), TokenerError> {
        self.state = match byte {
            b'{' => return self.open(Frame::Object(Map::new(), None), State::ObjectFirst),
            b'[' => return self.open(Frame::Array(Vec::new()), State::ArrayFirst),
            b'"' => State::Str(StrState::default()),
            b'-' | b'0'..=b'9' => State::Number(String::from(char::from(byte))),
            b't' => State::Literal { word: b"true", matched: 1 },
            b'f' => State::Literal { word: b"false", matched: 1 },
            b'n' => State::Literal { word: b"null", matched: 1 },
            _ => return Err(TokenerError::UnexpectedByte { byte, offset: self.offset }),
        };
        Ok(())
    }

    fn open(&mut self, frame: Frame, next: State) -> Result<(), TokenerError> {
        ensure!(self.stack.len() < self.max_depth, TokenerError::TooDeep { max_depth: self.max_depth });
        self.stack.push(frame);
        self.state = next;
        Ok(())
    }

    fn close(&mut self, byte: u8) -> Result<(), TokenerError> {
        let value = match (self.stack.pop(), byte) {
            (Some(Frame::Array(items)), b']') => Value::Array(items),
            (Some(Frame::Object(members, None)), b'}') => Value::Object(members),
            _ => return Err(TokenerError::UnexpectedByte { byte, offset: self.offset }),
        };
        self.emit(value);
        Ok(())
    }

    fn next_element(&mut self, byte: u8) -> Result<(), TokenerError> {
        self.state = match self.stack.last() {
            Some(Frame::Array(_)) => State::Value,
            Some(Frame::Object(..)) => State::ObjectKey,
            None => return Err(TokenerError::UnexpectedByte { byte, offset: self.offset }),
        };
        Ok(())
    }

    fn end_number(&mut self) -> Result<(), TokenerError> {
        let State::Number(digits) = std::mem::replace(&mut self.state, State::Value) else {
            return Ok(());
        };
        let number = digits.parse::<Number>().map_err(|_e| TokenerError::InvalidNumber { offset: self.offset })?;
        self.emit(Value::Number(number));
        Ok(())
    }

    fn set_key(&mut self, key: String) {
        if let Some(Frame::Object(_, pending)) = self.stack.last_mut() {
            *pending = Some(key);
        }
        self.state = State::Colon;
    }

    /// Hands a finished value to the enclosing container, or stores it as the result.
    fn emit(&mut self, value: Value) {
        match self.stack.last_mut() {
            None => {
                self.result = Some(value);
                self.state = State::Done;
            }
            Some(Frame::Array(items)) => {
                items.push(value);
                self.state = State::AfterValue;
            }
            Some(Frame::Object(members, pending)) => {
                if let Some(key) = pending.take() {
                    members.insert(key, value);
                }
                self.state = State::AfterValue;
            }
        }
    }
}

impl StrState {
    /// Takes one byte of string content; returns `true` on the closing quote.
    fn push(&mut self, byte: u8, offset: usize) -> Result<bool, TokenerError> {
        match self.escape {
            Escape::None => {
                // a high surrogate must be followed by another `\u` escape
                ensure!(self.high_surrogate.is_none() || byte == b'\\', TokenerError::InvalidEscape { offset });
                match byte {
                    b'"' => return Ok(true),
                    b'\\' => self.escape = Escape::Backslash,
                    0x00..=0x1f => return Err(TokenerError::InvalidString { offset }),
                    _ => self.buf.push(byte),
                }
            }

            Escape::Backslash => {
                ensure!(self.high_surrogate.is_none() || byte == b'u', TokenerError::InvalidEscape { offset });
                let unescaped = match byte {
                    b'"' => b'"',
                    b'\\' => b'\\',
                    b'/' => b'/',
                    b'b' => 0x08,
                    b'f' => 0x0c,
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'u' => {
                        self.escape = Escape::Unicode { digits: 0, code: 0 };
                        return Ok(false);
                    }
                    _ => return Err(TokenerError::InvalidEscape { offset }),
                };
                self.buf.push(unescaped);
                self.escape = Escape::None;
            }

            Escape::Unicode { digits, code } => {
                let digit = char::from(byte).to_digit(16).ok_or(TokenerError::InvalidEscape { offset })?;
                let code = (code << 4) | digit;
                if digits < 3 {
                    self.escape = Escape::Unicode { digits: digits + 1, code };
                } else {
                    self.escape = Escape::None;
                    self.push_code_point(code, offset)?;
                }
            }
        }
        Ok(false)
    }

    fn push_code_point(&mut self, code: u32, offset: usize) -> Result<(), TokenerError> {
        let ch = match (self.high_surrogate.take(), code) {
            (None, 0xD800..=0xDBFF) => {
                self.high_surrogate = Some(code);
                return Ok(());
            }
            (Some(high), 0xDC00..=0xDFFF) => char::from_u32(0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00)),
            (None, _) => char::from_u32(code),
            (Some(_), _) => None,
        };

        let ch = ch.ok_or(TokenerError::InvalidEscape { offset })?;
        let mut utf8 = [0; 4];
        self.buf.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
        Ok(())
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_number_byte(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}
