use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{LispError, Result};

// Decimal literals only; spellings like `inf` or `nan` stay symbols
static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("number pattern is valid")
});

/// Parse an atom as a number if it looks like one
pub fn parse_number(text: &str) -> Option<f64> {
    if NUMBER.is_match(text) {
        text.parse::<f64>().ok()
    } else {
        None
    }
}

// ============================================================================
// Lexer
// ============================================================================

/// Tokenizer over a complete source text.
///
/// The lexer is a cursor: the reader pulls one token at a time, so a single
/// lexer can be drained form by form.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            self.position += 1;
        }
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Skip whitespace and comments; true if any input remains
    pub fn skip_atmosphere(&mut self) -> bool {
        loop {
            while self.current_char().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.current_char() == Some(';') {
                self.skip_comment();
            } else {
                return !self.is_eof();
            }
        }
    }

    fn skip_comment(&mut self) {
        // Skip from semicolon to end of line (or EOF)
        while let Some(c) = self.current_char() {
            self.advance();
            if c == '\n' {
                break;
            }
        }
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// Read a string body; the opening quote is already consumed
    fn read_string(&mut self) -> Result<Token> {
        let mut content = String::new();

        loop {
            match self.current_char() {
                None => return Err(LispError::UnexpectedEndOfStream),
                Some('"') => {
                    self.advance();
                    return Ok(Token::Text(content));
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self.current_char().ok_or(LispError::UnexpectedEndOfStream)?;
                    self.advance();
                    content.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        // Any other escaped character stands for itself
                        other => other,
                    });
                }
                Some(c) => {
                    content.push(c);
                    self.advance();
                }
            }
        }
    }

    // ========================================================================
    // Atoms
    // ========================================================================

    fn is_delimiter(c: char) -> bool {
        c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';')
    }

    fn read_atom(&mut self) -> Token {
        let mut text = String::new();
        while let Some(c) = self.current_char() {
            if Self::is_delimiter(c) {
                break;
            }
            text.push(c);
            self.advance();
        }

        match parse_number(&text) {
            Some(n) => Token::Number(n),
            None => Token::Symbol(text),
        }
    }

    // ========================================================================
    // Main Tokenization
    // ========================================================================

    pub fn next_token(&mut self) -> Result<Token> {
        if !self.skip_atmosphere() {
            return Ok(Token::Eof);
        }

        match self.current_char() {
            Some('(') => {
                self.advance();
                Ok(Token::LParen)
            }
            Some(')') => {
                self.advance();
                Ok(Token::RParen)
            }
            Some('\'') => {
                self.advance();
                Ok(Token::Quote)
            }
            Some('"') => {
                self.advance();
                self.read_string()
            }
            Some(_) => Ok(self.read_atom()),
            None => Ok(Token::Eof),
        }
    }
}

// ============================================================================
// Token Types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Quote,
    Symbol(String),
    Number(f64),
    Text(String),
    Eof,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                break;
            }
            out.push(token);
        }
        out
    }

    #[test]
    fn test_list_tokens() {
        assert_eq!(
            tokens("(+ 1 2)"),
            vec![
                Token::LParen,
                Token::Symbol("+".into()),
                Token::Number(1.0),
                Token::Number(2.0),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokens("-3.5 1e3 .5 +2"), vec![
            Token::Number(-3.5),
            Token::Number(1000.0),
            Token::Number(0.5),
            Token::Number(2.0),
        ]);
    }

    #[test]
    fn test_number_like_symbols() {
        assert_eq!(
            tokens("inf nan - 1+ 1-2"),
            vec![
                Token::Symbol("inf".into()),
                Token::Symbol("nan".into()),
                Token::Symbol("-".into()),
                Token::Symbol("1+".into()),
                Token::Symbol("1-2".into()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""a\nb\t\"c\"""#),
            vec![Token::Text("a\nb\t\"c\"".into())]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"abc");
        assert_eq!(lexer.next_token(), Err(LispError::UnexpectedEndOfStream));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens("; leading\nfoo ; trailing\n; last"),
            vec![Token::Symbol("foo".into())]
        );
    }

    #[test]
    fn test_quote_and_namespaced_symbol() {
        assert_eq!(
            tokens("'sys:eof"),
            vec![Token::Quote, Token::Symbol("sys:eof".into())]
        );
    }

    #[test]
    fn test_skip_atmosphere() {
        let mut lexer = Lexer::new("  ; only a comment\n  ");
        assert!(!lexer.skip_atmosphere());
        let mut lexer = Lexer::new("  x");
        assert!(lexer.skip_atmosphere());
    }
}
