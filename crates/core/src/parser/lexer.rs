//! Byte-level tokenizer for PDF object syntax.
//!
//! The lexer never fails: a byte run that does not form a token yields
//! `None` and leaves the cursor where it was.

/// Keywords recognised by the object grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    BraceOpen,
    BraceClose,
    Null,
    Obj,
    EndObj,
    R,
    Stream,
    EndStream,
    XRef,
    Trailer,
    StartXRef,
    Other(String),
}

impl Keyword {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"null" => Self::Null,
            b"obj" => Self::Obj,
            b"endobj" => Self::EndObj,
            b"R" => Self::R,
            b"stream" => Self::Stream,
            b"endstream" => Self::EndStream,
            b"xref" => Self::XRef,
            b"trailer" => Self::Trailer,
            b"startxref" => Self::StartXRef,
            _ => Self::Other(name_from_bytes(b)),
        }
    }

    /// Keywords that delimit indirect objects and xref sections.
    ///
    /// These never appear as values inside arrays or dictionaries.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Obj
                | Self::EndObj
                | Self::R
                | Self::Stream
                | Self::EndStream
                | Self::XRef
                | Self::Trailer
                | Self::StartXRef
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ArrayStart => "[",
            Self::ArrayEnd => "]",
            Self::DictStart => "<<",
            Self::DictEnd => ">>",
            Self::BraceOpen => "{",
            Self::BraceClose => "}",
            Self::Null => "null",
            Self::Obj => "obj",
            Self::EndObj => "endobj",
            Self::R => "R",
            Self::Stream => "stream",
            Self::EndStream => "endstream",
            Self::XRef => "xref",
            Self::Trailer => "trailer",
            Self::StartXRef => "startxref",
            Self::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Real(f64),
    Bool(bool),
    Name(String),
    String(Vec<u8>),
    HexString(Vec<u8>),
    Keyword(Keyword),
}

pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Current position in the buffer
    pub const fn tell(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    pub const fn is_whitespace(b: u8) -> bool {
        matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
    }

    pub const fn is_delimiter(b: u8) -> bool {
        matches!(
            b,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
    }

    const fn is_regular(b: u8) -> bool {
        !Self::is_whitespace(b) && !Self::is_delimiter(b)
    }

    /// Skip whitespace and `%` comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'%' {
                self.pos += 1;
                match find_line_end(&self.data[self.pos..]) {
                    Some(offset) => self.pos += offset + 1,
                    None => self.pos = self.data.len(),
                }
                continue;
            }
            if !Self::is_whitespace(b) {
                return;
            }
            self.pos += 1;
        }
    }

    /// Skip plain whitespace only; comments are left in place.
    pub fn skip_plain_whitespace(&mut self) {
        while self.peek().is_some_and(Self::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Next token and the offset it starts at.
    pub fn next_token(&mut self) -> Option<(usize, Token)> {
        self.skip_whitespace();
        let start = self.pos;
        let b = self.peek()?;

        let token = match b {
            b'/' => Some(self.scan_name()),
            b'(' => self.scan_string(),
            b'<' if self.peek_at(1) == Some(b'<') => {
                self.pos += 2;
                Some(Token::Keyword(Keyword::DictStart))
            }
            b'<' => self.scan_hex_string(),
            b'>' if self.peek_at(1) == Some(b'>') => {
                self.pos += 2;
                Some(Token::Keyword(Keyword::DictEnd))
            }
            b'[' => self.single(Keyword::ArrayStart),
            b']' => self.single(Keyword::ArrayEnd),
            b'{' => self.single(Keyword::BraceOpen),
            b'}' => self.single(Keyword::BraceClose),
            b'+' | b'-' if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit() || c == b'.') => {
                Some(self.scan_number())
            }
            b'.' if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) => {
                Some(self.scan_number())
            }
            c if c.is_ascii_digit() => Some(self.scan_number()),
            c if Self::is_regular(c) => Some(self.scan_keyword()),
            // stray ')' or '>'
            _ => None,
        };

        match token {
            Some(token) => Some((start, token)),
            None => {
                self.pos = start;
                None
            }
        }
    }

    fn single(&mut self, kw: Keyword) -> Option<Token> {
        self.pos += 1;
        Some(Token::Keyword(kw))
    }

    fn scan_name(&mut self) -> Token {
        self.pos += 1;
        let mut name = Vec::new();

        while let Some(b) = self.peek() {
            if !Self::is_regular(b) {
                break;
            }
            if b == b'#'
                && let (Some(h), Some(l)) = (
                    self.peek_at(1).and_then(hex_value),
                    self.peek_at(2).and_then(hex_value),
                )
            {
                name.push((h << 4) | l);
                self.pos += 3;
                continue;
            }
            name.push(b);
            self.pos += 1;
        }

        Token::Name(name_from_bytes(&name))
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        let mut has_dot = false;

        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.pos += 1;
            } else if b == b'.' && !has_dot {
                has_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }

        // Digits, sign and dot are ASCII so this cannot fail.
        let s = std::str::from_utf8(&self.data[start..self.pos]).unwrap_or("0");
        if !has_dot && let Ok(n) = s.parse::<i64>() {
            return Token::Int(n);
        }
        let s = s.strip_prefix('+').unwrap_or(s);
        Token::Real(s.parse::<f64>().unwrap_or(0.0))
    }

    fn scan_string(&mut self) -> Option<Token> {
        self.pos += 1;
        let mut result = Vec::new();
        let mut depth = 1usize;

        loop {
            let c = self.peek()?;
            self.pos += 1;
            match c {
                b'(' => {
                    depth += 1;
                    result.push(c);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(Token::String(result));
                    }
                    result.push(c);
                }
                b'\\' => {
                    let e = self.peek()?;
                    self.pos += 1;
                    match e {
                        b'n' => result.push(b'\n'),
                        b'r' => result.push(b'\r'),
                        b't' => result.push(b'\t'),
                        b'b' => result.push(0x08),
                        b'f' => result.push(0x0c),
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut octal = u32::from(e - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        self.pos += 1;
                                        octal = octal * 8 + u32::from(d - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            result.push((octal & 0xFF) as u8);
                        }
                        // `\(`, `\)`, `\\` and unknown escapes keep the char
                        other => result.push(other),
                    }
                }
                _ => result.push(c),
            }
        }
    }

    fn scan_hex_string(&mut self) -> Option<Token> {
        self.pos += 1;
        let mut result = Vec::new();
        let mut pending: Option<u8> = None;

        loop {
            let c = self.peek()?;
            self.pos += 1;
            if c == b'>' {
                break;
            }
            if Self::is_whitespace(c) {
                continue;
            }
            let nibble = hex_value(c)?;
            match pending.take() {
                Some(high) => result.push((high << 4) | nibble),
                None => pending = Some(nibble),
            }
        }

        if let Some(high) = pending {
            result.push(high << 4);
        }
        Some(Token::HexString(result))
    }

    fn scan_keyword(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(Self::is_regular) {
            self.pos += 1;
        }
        match &self.data[start..self.pos] {
            b"true" => Token::Bool(true),
            b"false" => Token::Bool(false),
            bytes => Token::Keyword(Keyword::from_bytes(bytes)),
        }
    }
}

pub(crate) const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn find_line_end(data: &[u8]) -> Option<usize> {
    data.iter().position(|&b| b == b'\r' || b == b'\n')
}

pub(crate) fn name_from_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
