//! Minimal well-known-text (WKT1 / WKT2) reader
//!
//! Parses a CRS definition into a keyword tree so the resolver can look up
//! authorities, datums, projection methods and parameters. No semantic
//! validation happens here.

use crate::error::{Error, Result};

/// A `KEYWORD[arg, arg, ...]` node
#[derive(Debug, Clone, PartialEq)]
pub struct WktNode {
    pub keyword: String,
    pub args: Vec<WktValue>,
}

/// One argument of a WKT node
#[derive(Debug, Clone, PartialEq)]
pub enum WktValue {
    Text(String),
    Number(f64),
    /// Bare enumeration value such as `EAST`
    Ident(String),
    Node(WktNode),
}

impl WktNode {
    /// Parse a complete WKT string
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser {
            chars: input.char_indices().peekable(),
            input,
        };
        parser.skip_ws();
        let node = parser.node()?;
        parser.skip_ws();
        if parser.chars.peek().is_some() {
            return Err(Error::UnresolvedCrs("trailing characters after WKT".into()));
        }
        Ok(node)
    }

    /// First argument if it is a quoted string (the object name for most nodes)
    pub fn name(&self) -> Option<&str> {
        match self.args.first() {
            Some(WktValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Numeric argument at `index`
    pub fn number(&self, index: usize) -> Option<f64> {
        match self.args.get(index) {
            Some(WktValue::Number(n)) => Some(*n),
            Some(WktValue::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Direct child nodes
    pub fn children(&self) -> impl Iterator<Item = &WktNode> {
        self.args.iter().filter_map(|a| match a {
            WktValue::Node(n) => Some(n),
            _ => None,
        })
    }

    /// First direct child whose keyword matches one of `keywords` (case-insensitive)
    pub fn child(&self, keywords: &[&str]) -> Option<&WktNode> {
        self.children()
            .find(|n| keywords.iter().any(|k| n.keyword.eq_ignore_ascii_case(k)))
    }

    /// First node in a depth-first search (including self) matching one of `keywords`
    pub fn find(&self, keywords: &[&str]) -> Option<&WktNode> {
        if keywords.iter().any(|k| self.keyword.eq_ignore_ascii_case(k)) {
            return Some(self);
        }
        self.children().find_map(|n| n.find(keywords))
    }

    /// Authority code attached directly to this node (`AUTHORITY["EPSG","4326"]` or `ID["EPSG",4326]`)
    pub fn authority(&self) -> Option<(String, u32)> {
        let node = self.child(&["AUTHORITY", "ID"])?;
        let authority = node.name()?.to_string();
        let code = match node.args.get(1)? {
            WktValue::Text(s) => s.trim().parse().ok()?,
            WktValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 => *n as u32,
            _ => return None,
        };
        Some((authority, code))
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    input: &'a str,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::UnresolvedCrs(format!("malformed WKT: {msg}"))
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        word
    }

    fn node(&mut self) -> Result<WktNode> {
        let keyword = self.word();
        if keyword.is_empty() {
            return Err(self.error("expected keyword"));
        }
        self.skip_ws();
        self.node_after_keyword(keyword)
    }

    fn value(&mut self) -> Result<WktValue> {
        match self.chars.peek().copied() {
            Some((_, '"')) => {
                self.chars.next();
                let mut text = String::new();
                loop {
                    match self.chars.next() {
                        // WKT escapes quotes by doubling them
                        Some((_, '"')) => {
                            if matches!(self.chars.peek(), Some((_, '"'))) {
                                self.chars.next();
                                text.push('"');
                            } else {
                                break;
                            }
                        }
                        Some((_, c)) => text.push(c),
                        None => return Err(self.error("unterminated string")),
                    }
                }
                Ok(WktValue::Text(text))
            }
            Some((start, c)) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => {
                let mut end = start;
                while let Some(&(i, c)) = self.chars.peek() {
                    if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                        end = i + c.len_utf8();
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                self.input[start..end]
                    .parse()
                    .map(WktValue::Number)
                    .map_err(|_| self.error("invalid number"))
            }
            Some(_) => {
                let word = self.word();
                if word.is_empty() {
                    return Err(self.error("unexpected character"));
                }
                self.skip_ws();
                if matches!(self.chars.peek(), Some((_, '[')) | Some((_, '('))) {
                    Ok(WktValue::Node(self.node_after_keyword(word)?))
                } else {
                    Ok(WktValue::Ident(word))
                }
            }
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn node_after_keyword(&mut self, keyword: String) -> Result<WktNode> {
        let close = match self.chars.next() {
            Some((_, '[')) => ']',
            Some((_, '(')) => ')',
            _ => return Err(self.error("expected '[' after keyword")),
        };
        let mut args = Vec::new();
        loop {
            self.skip_ws();
            if matches!(self.chars.peek(), Some((_, c)) if *c == close) {
                self.chars.next();
                break;
            }
            args.push(self.value()?);
            self.skip_ws();
            match self.chars.next() {
                Some((_, ',')) => continue,
                Some((_, c)) if c == close => break,
                _ => return Err(self.error("expected ',' or closing bracket")),
            }
        }
        Ok(WktNode { keyword, args })
    }
}
