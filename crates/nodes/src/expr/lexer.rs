//! Lexer: turns expression source into tokens.

use super::ExprError;

/// A token produced by the lexer.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text; for string literals, the unescaped contents.
    pub text: String,
    /// Character offset of the token start (0-based).
    pub offset: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    Str,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Question,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,

    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identifier => "identifier",
            Self::Number => "number",
            Self::Str => "string",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::Colon => "':'",
            Self::Question => "'?'",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Percent => "'%'",
            Self::Bang => "'!'",
            Self::EqEq => "'=='",
            Self::NotEq => "'!='",
            Self::Lt => "'<'",
            Self::LtEq => "'<='",
            Self::Gt => "'>'",
            Self::GtEq => "'>='",
            Self::AndAnd => "'&&'",
            Self::OrOr => "'||'",
            Self::Eof => "end of input",
        };
        f.write_str(s)
    }
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, ExprError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                tokens.push(Token::new(TokenKind::Eof, "", self.pos));
                break;
            }
            tokens.push(self.next_token()?);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, ExprError> {
        let ch = self.input[self.pos];
        let offset = self.pos;

        let two = |lexer: &mut Self, kind: TokenKind, text: &str| -> Result<Token, ExprError> {
            lexer.pos += 2;
            Ok(Token::new(kind, text, offset))
        };
        let one = |lexer: &mut Self, kind: TokenKind| -> Result<Token, ExprError> {
            lexer.pos += 1;
            Ok(Token::new(kind, ch.to_string(), offset))
        };

        match ch {
            '=' if self.peek_at(1) == Some('=') => two(self, TokenKind::EqEq, "=="),
            '!' if self.peek_at(1) == Some('=') => two(self, TokenKind::NotEq, "!="),
            '<' if self.peek_at(1) == Some('=') => two(self, TokenKind::LtEq, "<="),
            '>' if self.peek_at(1) == Some('=') => two(self, TokenKind::GtEq, ">="),
            '&' if self.peek_at(1) == Some('&') => two(self, TokenKind::AndAnd, "&&"),
            '|' if self.peek_at(1) == Some('|') => two(self, TokenKind::OrOr, "||"),
            '(' => one(self, TokenKind::LParen),
            ')' => one(self, TokenKind::RParen),
            '[' => one(self, TokenKind::LBracket),
            ']' => one(self, TokenKind::RBracket),
            '{' => one(self, TokenKind::LBrace),
            '}' => one(self, TokenKind::RBrace),
            ',' => one(self, TokenKind::Comma),
            '.' => one(self, TokenKind::Dot),
            ':' => one(self, TokenKind::Colon),
            '?' => one(self, TokenKind::Question),
            '+' => one(self, TokenKind::Plus),
            '-' => one(self, TokenKind::Minus),
            '*' => one(self, TokenKind::Star),
            '/' => one(self, TokenKind::Slash),
            '%' => one(self, TokenKind::Percent),
            '!' => one(self, TokenKind::Bang),
            '<' => one(self, TokenKind::Lt),
            '>' => one(self, TokenKind::Gt),
            '"' | '\'' => self.read_string(ch),
            c if c.is_ascii_digit() => Ok(self.read_number()),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_identifier()),
            _ => Err(ExprError::Parse {
                offset,
                message: format!("unexpected character '{ch}'"),
            }),
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, ExprError> {
        let offset = self.pos;
        self.pos += 1;

        let mut text = String::new();
        loop {
            let Some(ch) = self.input.get(self.pos).copied() else {
                return Err(ExprError::Parse {
                    offset,
                    message: "unterminated string literal".into(),
                });
            };
            self.pos += 1;
            match ch {
                c if c == quote => break,
                '\\' => {
                    let escaped = self.input.get(self.pos).copied().ok_or_else(|| ExprError::Parse {
                        offset,
                        message: "unterminated string literal".into(),
                    })?;
                    self.pos += 1;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c => text.push(c),
            }
        }

        Ok(Token::new(TokenKind::Str, text, offset))
    }

    fn read_number(&mut self) -> Token {
        let offset = self.pos;
        let mut text = String::new();
        let mut seen_dot = false;

        while let Some(c) = self.input.get(self.pos).copied() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.' && !seen_dot && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) {
                seen_dot = true;
                text.push(c);
            } else {
                break;
            }
            self.pos += 1;
        }

        Token::new(TokenKind::Number, text, offset)
    }

    fn read_identifier(&mut self) -> Token {
        let offset = self.pos;
        let mut text = String::new();
        while let Some(c) = self.input.get(self.pos).copied() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            text.push(c);
            self.pos += 1;
        }
        Token::new(TokenKind::Identifier, text, offset)
    }

    fn skip_whitespace(&mut self) {
        while self.input.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn operators_prefer_two_char_forms() {
        assert_eq!(
            kinds("a <= b != !c && d || e"),
            vec![
                TokenKind::Identifier,
                TokenKind::LtEq,
                TokenKind::Identifier,
                TokenKind::NotEq,
                TokenKind::Bang,
                TokenKind::Identifier,
                TokenKind::AndAnd,
                TokenKind::Identifier,
                TokenKind::OrOr,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_member_dots() {
        let tokens = Lexer::new("1.5 inputs.0.x").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "1.5");
        assert_eq!(tokens[2].kind, TokenKind::Dot);
        // `0.x` must not be read as a decimal.
        assert_eq!(tokens[3].kind, TokenKind::Number);
        assert_eq!(tokens[3].text, "0");
        assert_eq!(tokens[4].kind, TokenKind::Dot);
    }

    #[test]
    fn strings_unescape() {
        let tokens = Lexer::new(r#"'it\'s' "a\"b\n""#).tokenize().unwrap();
        assert_eq!(tokens[0].text, "it's");
        assert_eq!(tokens[1].text, "a\"b\n");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(Lexer::new("'abc").tokenize().is_err());
    }

    #[test]
    fn stray_characters_are_rejected() {
        let err = Lexer::new("a = b").tokenize().unwrap_err();
        assert!(matches!(err, ExprError::Parse { offset: 2, .. }));
    }
}
