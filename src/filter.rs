//! LDAP-style requirement filters.
//!
//! Supports the RFC 1960 grammar used by module requirements: `&`, `|`, `!`,
//! equality, approximate (`~=`), ordering (`>=`, `<=`), presence (`=*`) and
//! substring (`=a*b*`) items, with `\` escaping. Comparison follows the type of
//! the capability attribute: numbers and versions compare numerically, strings
//! lexically, lists match when any element does.

use crate::error::FilterError;
use crate::model::{AttributeValue, Version};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equal(String, String),
    Approx(String, String),
    GreaterEq(String, String),
    LessEq(String, String),
    Present(String),
    /// Pieces split on unescaped `*`: first is the required prefix, last the
    /// required suffix (either may be empty), the rest must appear in order.
    Substring(String, Vec<String>),
}

#[derive(Clone, Copy)]
enum Op {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

impl Filter {
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let mut parser = Parser {
            src: input,
            bytes: input.as_bytes(),
            pos: 0,
        };
        let filter = parser.parse_filter()?;
        parser.skip_ws();
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("unexpected trailing characters"));
        }
        Ok(filter)
    }

    pub fn matches(&self, attributes: &BTreeMap<String, AttributeValue>) -> bool {
        match self {
            Filter::And(items) => items.iter().all(|f| f.matches(attributes)),
            Filter::Or(items) => items.iter().any(|f| f.matches(attributes)),
            Filter::Not(inner) => !inner.matches(attributes),
            Filter::Present(attr) => attributes.contains_key(attr),
            Filter::Equal(attr, value) => compare(attributes.get(attr), Op::Equal, value),
            Filter::Approx(attr, value) => compare(attributes.get(attr), Op::Approx, value),
            Filter::GreaterEq(attr, value) => compare(attributes.get(attr), Op::GreaterEq, value),
            Filter::LessEq(attr, value) => compare(attributes.get(attr), Op::LessEq, value),
            Filter::Substring(attr, pieces) => attributes
                .get(attr)
                .is_some_and(|actual| substring_matches(actual, pieces)),
        }
    }
}

fn compare(actual: Option<&AttributeValue>, op: Op, expected: &str) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    match actual {
        AttributeValue::String(s) => match op {
            Op::Equal => s == expected,
            Op::Approx => normalize_approx(s) == normalize_approx(expected),
            Op::GreaterEq => s.as_str() >= expected,
            Op::LessEq => s.as_str() <= expected,
        },
        AttributeValue::Long(n) => expected
            .trim()
            .parse::<i64>()
            .is_ok_and(|v| ordered(n.cmp(&v), op)),
        AttributeValue::Double(n) => expected
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|v| n.partial_cmp(&v))
            .is_some_and(|ord| ordered(ord, op)),
        AttributeValue::Boolean(b) => match op {
            Op::Equal | Op::Approx => expected.trim().eq_ignore_ascii_case(&b.to_string()),
            Op::GreaterEq | Op::LessEq => false,
        },
        AttributeValue::Version(v) => expected
            .parse::<Version>()
            .is_ok_and(|parsed| ordered(v.cmp(&parsed), op)),
        AttributeValue::List(items) => items.iter().any(|item| compare(Some(item), op, expected)),
    }
}

fn ordered(ord: Ordering, op: Op) -> bool {
    match op {
        Op::Equal | Op::Approx => ord == Ordering::Equal,
        Op::GreaterEq => ord != Ordering::Less,
        Op::LessEq => ord != Ordering::Greater,
    }
}

fn normalize_approx(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn substring_matches(actual: &AttributeValue, pieces: &[String]) -> bool {
    match actual {
        AttributeValue::String(s) => substring_str(s, pieces),
        AttributeValue::List(items) => items.iter().any(|item| substring_matches(item, pieces)),
        _ => false,
    }
}

fn substring_str(value: &str, pieces: &[String]) -> bool {
    let (Some(first), Some(last)) = (pieces.first(), pieces.last()) else {
        return false;
    };
    if !value.starts_with(first.as_str()) {
        return false;
    }
    let mut cursor = first.len();
    let end = value.len();
    if end < cursor + last.len() || !value.ends_with(last.as_str()) {
        return false;
    }
    let limit = end - last.len();
    for piece in &pieces[1..pieces.len() - 1] {
        match value[cursor..limit].find(piece.as_str()) {
            Some(offset) => cursor += offset + piece.len(),
            None => return false,
        }
    }
    true
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> FilterError {
        FilterError {
            filter: self.src.to_string(),
            position: self.pos,
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: u8) -> Result<(), FilterError> {
        match self.peek() {
            Some(b) if b == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(self.error(&format!("expected '{}'", wanted as char))),
            None => Err(self.error(&format!(
                "unexpected end of filter, expected '{}'",
                wanted as char
            ))),
        }
    }

    fn parse_filter(&mut self) -> Result<Filter, FilterError> {
        self.skip_ws();
        self.expect(b'(')?;
        self.skip_ws();
        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.parse_list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.parse_list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_ws();
        self.expect(b')')?;
        Ok(filter)
    }

    fn parse_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some(b'(') {
                if items.is_empty() {
                    return Err(self.error("empty filter list"));
                }
                return Ok(items);
            }
            items.push(self.parse_filter()?);
        }
    }

    fn parse_item(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b'=' | b'~' | b'<' | b'>') => break,
                Some(b'(' | b')') | None => return Err(self.error("missing filter operator")),
                Some(_) => self.pos += 1,
            }
        }
        let attr = self.src[start..self.pos].trim().to_string();
        if attr.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match self.peek() {
            Some(b'=') => {
                self.pos += 1;
                Op::Equal
            }
            Some(b'~') => {
                self.pos += 1;
                self.expect(b'=')?;
                Op::Approx
            }
            Some(b'<') => {
                self.pos += 1;
                self.expect(b'=')?;
                Op::LessEq
            }
            _ => {
                self.pos += 1;
                self.expect(b'=')?;
                Op::GreaterEq
            }
        };

        let pieces = self.parse_value(matches!(op, Op::Equal))?;
        Ok(match op {
            Op::Approx => Filter::Approx(attr, pieces.concat()),
            Op::LessEq => Filter::LessEq(attr, pieces.concat()),
            Op::GreaterEq => Filter::GreaterEq(attr, pieces.concat()),
            Op::Equal if pieces.len() == 1 => {
                Filter::Equal(attr, pieces.into_iter().next().unwrap_or_default())
            }
            Op::Equal if pieces.len() == 2 && pieces.iter().all(String::is_empty) => {
                Filter::Present(attr)
            }
            Op::Equal => Filter::Substring(attr, pieces),
        })
    }

    /// Reads up to (not including) the closing `)`. With `split_stars`, each
    /// unescaped `*` starts a new piece.
    fn parse_value(&mut self, split_stars: bool) -> Result<Vec<String>, FilterError> {
        let mut pieces = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                Some(b')') => break,
                Some(b'(') => return Err(self.error("unescaped '(' in value")),
                Some(b'\\') => {
                    self.pos += 1;
                    let Some(escaped) = self.peek() else {
                        return Err(self.error("dangling escape at end of filter"));
                    };
                    current.push(escaped);
                    self.pos += 1;
                }
                Some(b'*') if split_stars => {
                    pieces.push(self.take_piece(&mut current)?);
                    self.pos += 1;
                }
                Some(b) => {
                    current.push(b);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated filter value")),
            }
        }
        pieces.push(self.take_piece(&mut current)?);
        Ok(pieces)
    }

    fn take_piece(&self, current: &mut Vec<u8>) -> Result<String, FilterError> {
        String::from_utf8(std::mem::take(current))
            .map_err(|_| self.error("filter value is not valid UTF-8"))
    }
}
