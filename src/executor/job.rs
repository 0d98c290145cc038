// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Requests for the external toolkit, and the call strings that represent
//! them.
//!
//! A job renders as a call with keyword arguments, e.g.
//! `gaincal(vis='x.ms', caltable='x.gcal', spwmap=[0, 0, 1], calwt=True)`.
//! The same syntax is parsed back when reading exported calibration states.

use std::{fmt, str::FromStr};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The value of a job argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ArgValue>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Convert a JSON value. Nulls and objects (and lists containing them)
    /// have no argument representation.
    pub fn from_json(value: &serde_json::Value) -> Option<ArgValue> {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Some(ArgValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(ArgValue::Int)
                .or_else(|| n.as_f64().map(ArgValue::Float)),
            Value::String(s) => Some(ArgValue::Str(s.clone())),
            Value::Array(a) => a
                .iter()
                .map(ArgValue::from_json)
                .collect::<Option<Vec<_>>>()
                .map(ArgValue::List),
            Value::Null | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(true) => write!(f, "True"),
            ArgValue::Bool(false) => write!(f, "False"),
            ArgValue::Int(i) => write!(f, "{i}"),
            ArgValue::Float(x) => write!(f, "{x:?}"),
            ArgValue::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            ArgValue::List(l) => write!(f, "[{}]", l.iter().join(", ")),
        }
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl From<i64> for ArgValue {
    fn from(i: i64) -> Self {
        ArgValue::Int(i)
    }
}

impl From<i32> for ArgValue {
    fn from(i: i32) -> Self {
        ArgValue::Int(i.into())
    }
}

impl From<usize> for ArgValue {
    fn from(i: usize) -> Self {
        ArgValue::Int(i as i64)
    }
}

impl From<f64> for ArgValue {
    fn from(x: f64) -> Self {
        ArgValue::Float(x)
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Str(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Str(s)
    }
}

impl From<&String> for ArgValue {
    fn from(s: &String) -> Self {
        ArgValue::Str(s.clone())
    }
}

impl<T: Into<ArgValue>> From<Vec<T>> for ArgValue {
    fn from(v: Vec<T>) -> Self {
        ArgValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// A single invocation of a toolkit function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub fn_name: String,
    pub args: Vec<(String, ArgValue)>,
}

impl JobRequest {
    pub fn new<S: Into<String>>(fn_name: S) -> JobRequest {
        JobRequest {
            fn_name: fn_name.into(),
            args: vec![],
        }
    }

    /// Add an argument. Setting an argument twice replaces the earlier value
    /// but keeps its position.
    pub fn arg<K: Into<String>, V: Into<ArgValue>>(mut self, name: K, value: V) -> JobRequest {
        let name = name.into();
        let value = value.into();
        match self.args.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.args.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.args.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

impl fmt::Display for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.fn_name,
            self.args.iter().map(|(k, v)| format!("{k}={v}")).join(", ")
        )
    }
}

impl FromStr for JobRequest {
    type Err = CallParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CallParser::new(s).call()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CallParseError {
    #[error("Expected {expected} at position {pos} of '{call}'")]
    Expected {
        expected: &'static str,
        pos: usize,
        call: String,
    },

    #[error("Unterminated string starting at position {pos} of '{call}'")]
    UnterminatedString { pos: usize, call: String },

    #[error("Couldn't parse '{value}' as a number in '{call}'")]
    BadNumber { value: String, call: String },
}

struct CallParser<'a> {
    call: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> CallParser<'a> {
    fn new(call: &'a str) -> Self {
        Self {
            call,
            chars: call.chars().collect(),
            pos: 0,
        }
    }

    fn expected(&self, expected: &'static str) -> CallParseError {
        CallParseError::Expected {
            expected,
            pos: self.pos,
            call: self.call.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char, expected: &'static str) -> Result<(), CallParseError> {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.expected(expected))
        }
    }

    fn identifier(&mut self, expected: &'static str) -> Result<String, CallParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .peek()
            .map(|c| c.is_alphanumeric() || c == '_' || c == '.')
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.expected(expected));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn call(mut self) -> Result<JobRequest, CallParseError> {
        let fn_name = self.identifier("a function name")?;
        self.eat('(', "'('")?;

        let mut job = JobRequest::new(fn_name);
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.pos += 1;
        } else {
            loop {
                let key = self.identifier("an argument name")?;
                self.eat('=', "'='")?;
                let value = self.value()?;
                job.args.push((key, value));

                self.skip_whitespace();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some(')') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.expected("',' or ')'")),
                }
            }
        }

        self.skip_whitespace();
        if self.pos != self.chars.len() {
            return Err(self.expected("the end of the call"));
        }
        Ok(job)
    }

    fn value(&mut self) -> Result<ArgValue, CallParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(q @ ('\'' | '"')) => self.string(q),
            Some('[') => self.list(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() => {
                let word = self.identifier("a value")?;
                match word.as_str() {
                    "True" | "true" => Ok(ArgValue::Bool(true)),
                    "False" | "false" => Ok(ArgValue::Bool(false)),
                    _ => Err(self.expected("a value")),
                }
            }
            _ => Err(self.expected("a value")),
        }
    }

    fn string(&mut self, quote: char) -> Result<ArgValue, CallParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(CallParseError::UnterminatedString {
                        pos: start,
                        call: self.call.to_string(),
                    })
                }
                Some('\\') => {
                    self.pos += 1;
                    if let Some(c) = self.peek() {
                        s.push(c);
                        self.pos += 1;
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(ArgValue::Str(s));
                }
                Some(c) => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn list(&mut self) -> Result<ArgValue, CallParseError> {
        self.pos += 1;
        let mut items = vec![];
        self.skip_whitespace();
        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(ArgValue::List(items));
        }
        loop {
            items.push(self.value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    // Allow a trailing comma.
                    self.skip_whitespace();
                    if self.peek() == Some(']') {
                        self.pos += 1;
                        return Ok(ArgValue::List(items));
                    }
                }
                Some(']') => {
                    self.pos += 1;
                    return Ok(ArgValue::List(items));
                }
                _ => return Err(self.expected("',' or ']'")),
            }
        }
    }

    fn number(&mut self) -> Result<ArgValue, CallParseError> {
        let start = self.pos;
        while self
            .peek()
            .map(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        let s: String = self.chars[start..self.pos].iter().collect();
        let bad_number = || CallParseError::BadNumber {
            value: s.clone(),
            call: self.call.to_string(),
        };
        if s.contains(['.', 'e', 'E']) {
            s.parse().map(ArgValue::Float).map_err(|_| bad_number())
        } else {
            s.parse().map(ArgValue::Int).map_err(|_| bad_number())
        }
    }
}
