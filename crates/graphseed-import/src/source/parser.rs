//! Brace-block grammar for nested cells.
//!
//! A cell whose text starts with `{` is a block. `{{...},{...}}` is a
//! collection of blocks, `{key:value,...}` a named group whose values are
//! scalars or nested blocks. Scalars are trimmed and lose one pair of
//! matching outer quotes. Inside double quotes, commas, colons and braces
//! are plain text.

use graphseed_core::{Entry, Node, ParseError};

/// Parse one cell into a node. Cells that do not start with `{` are scalars
/// and keep their text unchanged.
pub fn parse_cell(text: &str) -> Result<Node, ParseError> {
    if !text.trim_start().starts_with('{') {
        return Ok(Node::Scalar(text.to_string()));
    }

    let mut parser = BlockParser::new(text);
    parser.skip_whitespace();
    let node = parser.block()?;
    parser.skip_whitespace();
    if parser.pos < text.len() {
        return Err(ParseError::malformed(
            parser.pos,
            "unexpected text after closing brace",
        ));
    }
    Ok(node)
}

struct BlockParser<'s> {
    text: &'s str,
    bytes: &'s [u8],
    pos: usize,
}

impl<'s> BlockParser<'s> {
    fn new(text: &'s str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(byte) if byte.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn block(&mut self) -> Result<Node, ParseError> {
        let open = self.pos;
        if self.next_byte() != Some(b'{') {
            return Err(ParseError::malformed(open, "expected '{'"));
        }

        self.skip_whitespace();
        match self.peek() {
            Some(b'}') => {
                self.pos += 1;
                Ok(Node::Group(Entry::new()))
            }
            Some(b'{') => self.collection(),
            Some(_) => self.group(),
            None => Err(ParseError::malformed(open, "unclosed brace")),
        }
    }

    fn collection(&mut self) -> Result<Node, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            items.push(self.block()?);
            self.skip_whitespace();
            match self.next_byte() {
                Some(b',') => continue,
                Some(b'}') => return Ok(Node::Collection(items)),
                Some(_) => {
                    return Err(ParseError::malformed(
                        self.pos - 1,
                        "expected ',' or '}' between collection items",
                    ));
                }
                None => return Err(ParseError::malformed(self.pos, "unclosed collection")),
            }
        }
    }

    fn group(&mut self) -> Result<Node, ParseError> {
        let mut fields = Vec::new();
        loop {
            self.skip_whitespace();
            let key = self.key()?;
            self.skip_whitespace();
            let value = if self.peek() == Some(b'{') {
                self.block()?
            } else {
                Node::Scalar(self.scalar()?)
            };
            fields.push((key, value));

            self.skip_whitespace();
            match self.next_byte() {
                Some(b',') => continue,
                Some(b'}') => return Ok(Node::Group(Entry::from_fields(fields))),
                Some(_) => {
                    return Err(ParseError::malformed(
                        self.pos - 1,
                        "expected ',' or '}' after value",
                    ));
                }
                None => return Err(ParseError::malformed(self.pos, "unclosed group")),
            }
        }
    }

    fn key(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let mut in_quotes = false;
        loop {
            match self.next_byte() {
                Some(b'"') => in_quotes = !in_quotes,
                Some(b':') if !in_quotes => break,
                Some(b',' | b'{' | b'}') if !in_quotes => {
                    return Err(ParseError::malformed(self.pos - 1, "expected ':' after key"));
                }
                Some(_) => {}
                None => return Err(ParseError::malformed(start, "unterminated key")),
            }
        }

        let key = clean_scalar(&self.text[start..self.pos - 1]);
        if key.is_empty() {
            return Err(ParseError::malformed(start, "empty key"));
        }
        Ok(key)
    }

    fn scalar(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let mut in_quotes = false;
        let mut depth = 0_usize;
        while let Some(byte) = self.peek() {
            match byte {
                b'"' => in_quotes = !in_quotes,
                b'{' if !in_quotes => depth += 1,
                b'}' if !in_quotes && depth == 0 => break,
                b'}' if !in_quotes => depth -= 1,
                b',' if !in_quotes && depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }

        if in_quotes {
            return Err(ParseError::malformed(start, "unterminated quote"));
        }
        Ok(clean_scalar(&self.text[start..self.pos]))
    }
}

/// Trim and strip one pair of matching outer quotes.
fn clean_scalar(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}
