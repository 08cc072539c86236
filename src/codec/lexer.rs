//! A forgiving HCL tokenizer.
//!
//! The lexer never fails. It recognises just enough of the language to tell block structure,
//! expressions and template interpolations apart: comments are skipped, quoted strings and
//! heredocs become single tokens, and the contents of `${ … }` / `%{ … }` interpolations are
//! tokenized in place with an increased [Token::template_depth]. Tokens are emitted in source
//! order; an interpolation's tokens follow the string or heredoc token that contains them.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Number,
    /// Quoted string. `text` holds the literal content with escapes applied and
    /// interpolations removed.
    Str,
    /// Heredoc. `text` holds the marker.
    Heredoc,
    Dot,
    Comma,
    Colon,
    Assign,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Star,
    Newline,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte span in the source text.
    pub span: Range<usize>,
    /// 0 for structural tokens, n for tokens nested in n template interpolations.
    pub template_depth: u32,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

pub fn tokenize(text: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        src: text,
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.lex_expressions(0, false);
    lexer.tokens
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: usize, depth: u32) {
        self.tokens.push(Token {
            kind,
            text: self.src[start..self.pos].to_string(),
            span: start..self.pos,
            template_depth: depth,
        });
    }

    /// Tokenizes expressions and structure until end of input, or, inside a template
    /// interpolation, until the brace that closes it.
    fn lex_expressions(&mut self, depth: u32, in_template: bool) {
        let mut braces = 0u32;
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                '\n' => {
                    self.bump();
                    self.push(TokenKind::Newline, start, depth);
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '#' => self.skip_line(),
                '/' if self.peek_at(1) == Some('/') => self.skip_line(),
                '/' if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                '"' => self.lex_string(depth),
                '<' if self.heredoc_marker().is_some() => self.lex_heredoc(depth),
                '{' => {
                    self.bump();
                    braces += 1;
                    self.push(TokenKind::LBrace, start, depth);
                }
                '}' => {
                    self.bump();
                    if in_template && braces == 0 {
                        return;
                    }
                    braces = braces.saturating_sub(1);
                    self.push(TokenKind::RBrace, start, depth);
                }
                '~' if in_template && braces == 0 && self.peek_at(1) == Some('}') => {
                    self.bump();
                    self.bump();
                    return;
                }
                '=' => {
                    self.bump();
                    if matches!(self.peek(), Some('=') | Some('>')) {
                        self.bump();
                        self.push(TokenKind::Other, start, depth);
                    } else {
                        self.push(TokenKind::Assign, start, depth);
                    }
                }
                '!' | '<' | '>' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                    }
                    self.push(TokenKind::Other, start, depth);
                }
                c if is_ident_start(c) => {
                    while self.peek().is_some_and(is_ident_continue) {
                        self.bump();
                    }
                    self.push(TokenKind::Ident, start, depth);
                }
                c if c.is_ascii_digit() => {
                    self.lex_number();
                    self.push(TokenKind::Number, start, depth);
                }
                _ => {
                    self.bump();
                    let kind = match c {
                        '.' => TokenKind::Dot,
                        ',' => TokenKind::Comma,
                        ':' => TokenKind::Colon,
                        '[' => TokenKind::LBracket,
                        ']' => TokenKind::RBracket,
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        '*' => TokenKind::Star,
                        _ => TokenKind::Other,
                    };
                    self.push(kind, start, depth);
                }
            }
        }
    }

    /// Skips to (not past) the next newline.
    fn skip_line(&mut self) {
        match self.rest().find('\n') {
            Some(idx) => self.pos += idx,
            None => self.pos = self.src.len(),
        }
    }

    fn skip_block_comment(&mut self) {
        match self.rest()[2..].find("*/") {
            Some(idx) => self.pos += idx + 4,
            None => self.pos = self.src.len(),
        }
    }

    fn lex_number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let digits_at = match self.peek_at(1) {
                Some('+') | Some('-') => 2,
                _ => 1,
            };
            if self.peek_at(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digits_at {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
    }

    /// Returns true and consumes an escaped template opener (`$${` or `%%{`), or consumes an
    /// interpolation opener and tokenizes its contents.
    fn lex_template_sequence(&mut self, depth: u32) -> Option<bool> {
        let c = self.peek()?;
        if c != '$' && c != '%' {
            return None;
        }
        if self.peek_at(1) == Some(c) && self.peek_at(2) == Some('{') {
            self.bump();
            self.bump();
            self.bump();
            return Some(true);
        }
        if self.peek_at(1) == Some('{') {
            self.bump();
            self.bump();
            if self.peek() == Some('~') {
                self.bump();
            }
            self.lex_expressions(depth + 1, true);
            return Some(false);
        }
        None
    }

    fn reserve(&mut self, kind: TokenKind, start: usize, depth: u32) -> usize {
        self.tokens.push(Token {
            kind,
            text: String::new(),
            span: start..start,
            template_depth: depth,
        });
        self.tokens.len() - 1
    }

    fn lex_string(&mut self, depth: u32) {
        let start = self.pos;
        let slot = self.reserve(TokenKind::Str, start, depth);
        self.bump();
        let mut value = String::new();
        while let Some(c) = self.peek() {
            match c {
                // Quoted strings cannot span lines; treat as unterminated.
                '\n' => break,
                '"' => {
                    self.bump();
                    break;
                }
                '\\' => {
                    self.bump();
                    match self.peek() {
                        Some('\n') | None => {}
                        Some(escaped) => {
                            self.bump();
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => other,
                            });
                        }
                    }
                }
                '$' | '%' => match self.lex_template_sequence(depth) {
                    Some(true) => {
                        value.push(c);
                        value.push('{');
                    }
                    Some(false) => {}
                    None => {
                        self.bump();
                        value.push(c);
                    }
                },
                other => {
                    self.bump();
                    value.push(other);
                }
            }
        }
        let token = &mut self.tokens[slot];
        token.text = value;
        token.span = start..self.pos;
    }

    /// If a heredoc header (`<<MARKER` or `<<-MARKER` followed by end of line) starts here,
    /// returns the marker and the length of the header including its newline.
    fn heredoc_marker(&self) -> Option<(String, usize)> {
        let rest = self.rest();
        let after_arrows = rest.strip_prefix("<<")?;
        let after_dash = after_arrows.strip_prefix('-').unwrap_or(after_arrows);
        let mut chars = after_dash.char_indices();
        let (_, first) = chars.next()?;
        if !is_ident_start(first) {
            return None;
        }
        let marker_end = chars
            .find(|(_, c)| !is_ident_continue(*c))
            .map(|(idx, _)| idx)
            .unwrap_or(after_dash.len());
        let marker = &after_dash[..marker_end];
        let tail = &after_dash[marker_end..];
        let line_end = tail.find('\n')?;
        if !tail[..line_end].trim().is_empty() {
            return None;
        }
        let header_len = rest.len() - tail.len() + line_end + 1;
        Some((marker.to_string(), header_len))
    }

    fn lex_heredoc(&mut self, depth: u32) {
        let Some((marker, header_len)) = self.heredoc_marker() else {
            return;
        };
        let start = self.pos;
        let slot = self.reserve(TokenKind::Heredoc, start, depth);
        self.pos += header_len;
        let mut at_line_start = true;
        while self.pos < self.src.len() {
            if at_line_start {
                let line_len = self.rest().find('\n').unwrap_or(self.rest().len());
                if self.rest()[..line_len].trim() == marker {
                    self.pos += line_len;
                    break;
                }
                at_line_start = false;
            }
            if self.lex_template_sequence(depth).is_some() {
                continue;
            }
            if self.bump() == Some('\n') {
                at_line_start = true;
            }
        }
        let token = &mut self.tokens[slot];
        token.text = marker;
        token.span = start..self.pos;
    }
}
