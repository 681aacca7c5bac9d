use std::fmt;

use crate::value::parse_float_prefix;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Identifier(String),

    // `const`, `let`, `var`
    Keyword(String),

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    StarStar,

    // Comparison
    Gt,
    Lt,
    Ge,
    Le,
    EqEq,
    Ne,

    OrOr,
    Assign,
    Question,
    Colon,

    // Punctuation
    LParen,
    RParen,
    Comma,
    Semicolon,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "number `{v}`"),
            Self::String(s) => write!(f, "string {s:?}"),
            Self::Identifier(name) => write!(f, "identifier `{name}`"),
            Self::Keyword(kw) => write!(f, "keyword `{kw}`"),
            other => write!(f, "`{}`", other.symbol()),
        }
    }
}

impl TokenKind {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::StarStar => "**",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::EqEq => "==",
            Self::Ne => "!=",
            Self::OrOr => "||",
            Self::Assign => "=",
            Self::Question => "?",
            Self::Colon => ":",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Number(_) | Self::String(_) | Self::Identifier(_) | Self::Keyword(_) => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// Hand-written scanner for calculation scripts.
///
/// The scanner never fails: characters that start no token are dropped.
pub struct Lexer<'a> {
    chars: std::str::Chars<'a>,
    peeked: Option<char>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars(),
            peeked: None,
            line: 1,
            col: 0,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = if let Some(ch) = self.peeked.take() {
            Some(ch)
        } else {
            self.chars.next()
        };
        if let Some(ch) = ch {
            if ch == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += 1;
            }
        }
        ch
    }

    fn peek(&mut self) -> Option<char> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn is_whitespace(ch: char) -> bool {
        matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C')
    }

    fn is_ident_start(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    fn is_ident_continue(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_'
    }

    fn lex_number(&mut self, first: char) -> TokenKind {
        let mut buf = String::new();
        buf.push(first);
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '.' {
                buf.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        // Runs like `1.2.3` are accepted; conversion keeps the longest valid prefix.
        TokenKind::Number(parse_float_prefix(&buf))
    }

    fn lex_identifier(&mut self, first: char) -> TokenKind {
        let mut buf = String::new();
        buf.push(first);
        while let Some(ch) = self.peek() {
            if Self::is_ident_continue(ch) {
                buf.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        if matches!(buf.as_str(), "const" | "let" | "var") {
            TokenKind::Keyword(buf)
        } else {
            TokenKind::Identifier(buf)
        }
    }

    fn lex_string(&mut self, quote: char) -> TokenKind {
        let mut buf = String::new();
        while let Some(ch) = self.bump() {
            if ch == quote {
                break;
            }
            if ch == '\\' {
                // The backslash is dropped and the next character kept verbatim: `\n` is `n`.
                if let Some(next) = self.bump() {
                    buf.push(next);
                }
                continue;
            }
            buf.push(ch);
        }
        TokenKind::String(buf)
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    pub fn next_token(&mut self) -> Option<Token> {
        loop {
            let ch = self.peek()?;
            if Self::is_whitespace(ch) {
                self.bump();
                continue;
            }

            let line = self.line;
            let col = self.col + 1;
            self.bump();

            let kind = match ch {
                '/' if self.peek() == Some('/') => {
                    self.skip_comment();
                    continue;
                }
                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.lex_number(ch),
                c if c.is_ascii_digit() => self.lex_number(c),
                c if Self::is_ident_start(c) => self.lex_identifier(c),
                '"' | '\'' => self.lex_string(ch),
                '|' if self.bump_if('|') => TokenKind::OrOr,
                '*' if self.bump_if('*') => TokenKind::StarStar,
                '>' if self.bump_if('=') => TokenKind::Ge,
                '<' if self.bump_if('=') => TokenKind::Le,
                '=' if self.bump_if('=') => TokenKind::EqEq,
                '!' if self.bump_if('=') => TokenKind::Ne,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '>' => TokenKind::Gt,
                '<' => TokenKind::Lt,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semicolon,
                '=' => TokenKind::Assign,
                '?' => TokenKind::Question,
                ':' => TokenKind::Colon,
                _ => continue,
            };

            return Some(Token { kind, line, col });
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Tokenize a whole script.
pub fn tokenize(src: &str) -> Vec<Token> {
    Lexer::new(src).collect()
}
