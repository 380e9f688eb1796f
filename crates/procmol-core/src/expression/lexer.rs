use super::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Integer(i64),
    Double(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Bang,
    EqualEqual,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,
    LParen,
    RParen,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    index: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn advance_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.index += 1;
        Some(c)
    }

    fn run(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.index += 1;
                continue;
            }
            let position = self.index;
            let kind = if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).is_some_and(|n| n.is_ascii_digit()))
            {
                self.lex_number()?
            } else if c.is_alphabetic() || c == '_' {
                self.lex_identifier()
            } else {
                self.lex_symbol()?
            };
            tokens.push(Token { kind, position });
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            position: self.index,
        });
        Ok(tokens)
    }

    fn lex_number(&mut self) -> Result<TokenKind, ExpressionError> {
        let start = self.index;
        let mut is_double = false;

        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.index += 1;
        }
        if self.peek_char() == Some('.') {
            is_double = true;
            self.index += 1;
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.index += 1;
            }
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let digit_offset = match self.peek_char_at(1) {
                Some('+' | '-') => 2,
                _ => 1,
            };
            if self.peek_char_at(digit_offset).is_some_and(|c| c.is_ascii_digit()) {
                is_double = true;
                self.index += digit_offset;
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.index += 1;
                }
            }
        }

        let text: String = self.chars[start..self.index].iter().collect();
        if !is_double {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(TokenKind::Integer(value));
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Double)
            .map_err(|_| ExpressionError::syntax(start, format!("invalid number '{text}'")))
    }

    fn lex_identifier(&mut self) -> TokenKind {
        let start = self.index;
        while self
            .peek_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.index += 1;
        }
        TokenKind::Identifier(self.chars[start..self.index].iter().collect())
    }

    fn lex_symbol(&mut self) -> Result<TokenKind, ExpressionError> {
        let position = self.index;
        let Some(c) = self.advance_char() else {
            return Ok(TokenKind::Eof);
        };
        let next = self.peek_char();
        let kind = match (c, next) {
            ('=', Some('=')) => {
                self.index += 1;
                TokenKind::EqualEqual
            }
            ('!', Some('=')) => {
                self.index += 1;
                TokenKind::NotEqual
            }
            ('<', Some('=')) => {
                self.index += 1;
                TokenKind::LessEqual
            }
            ('>', Some('=')) => {
                self.index += 1;
                TokenKind::GreaterEqual
            }
            ('&', Some('&')) => {
                self.index += 1;
                TokenKind::AndAnd
            }
            ('|', Some('|')) => {
                self.index += 1;
                TokenKind::OrOr
            }
            ('+', _) => TokenKind::Plus,
            ('-', _) => TokenKind::Minus,
            ('*', _) => TokenKind::Star,
            ('/', _) => TokenKind::Slash,
            ('%', _) => TokenKind::Percent,
            ('^', _) => TokenKind::Caret,
            ('!', _) => TokenKind::Bang,
            ('<', _) => TokenKind::Less,
            ('>', _) => TokenKind::Greater,
            ('(', _) => TokenKind::LParen,
            (')', _) => TokenKind::RParen,
            (',', _) => TokenKind::Comma,
            _ => {
                return Err(ExpressionError::syntax(
                    position,
                    format!("unexpected character '{c}'"),
                ));
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn integers_and_doubles_are_distinguished() {
        assert_eq!(
            kinds("3 3.0 .5 1e3 2.5E-2"),
            vec![
                TokenKind::Integer(3),
                TokenKind::Double(3.0),
                TokenKind::Double(0.5),
                TokenKind::Double(1000.0),
                TokenKind::Double(0.025),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn exponent_without_digits_is_left_for_identifier() {
        assert_eq!(
            kinds("2e"),
            vec![
                TokenKind::Integer(2),
                TokenKind::Identifier("e".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_character_operators() {
        assert_eq!(
            kinds("a<=b&&c!=d||!e"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::LessEqual,
                TokenKind::Identifier("b".to_string()),
                TokenKind::AndAnd,
                TokenKind::Identifier("c".to_string()),
                TokenKind::NotEqual,
                TokenKind::Identifier("d".to_string()),
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Identifier("e".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_character_reports_position() {
        let err = tokenize("1 + $").unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { position: 4, .. }));
    }
}
