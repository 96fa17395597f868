//! Hand-rolled byte-scanning lexer.
//!
//! Dispatch rules (see `shift`) mirror the original compiler's `Lexer::shift`
//! exactly: case of the leading letter selects TypeName vs. identifier,
//! digits start a number, the fixed operator-character set greedily
//! consumes a run into one `Operator` token, and a handful of characters are
//! single-character punctuation.

use std::rc::Rc;

use log::trace;

use crate::diagnostics::{CraeftError, CraeftResult, SourcePos};
use crate::token::{Token, TokenKind};

/// Characters that can appear in a (possibly multi-character) operator.
const OPCHARS: &str = "!:.*=+-><&%^@~/";

fn is_opchar(c: char) -> bool {
    OPCHARS.contains(c)
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub struct Lexer<'a> {
    input: &'a [u8],
    file: Rc<str>,
    position: usize,
    line: u32,
    col: u32,
    pub current: Token,
}

impl<'a> Lexer<'a> {
    pub fn new(file: impl Into<Rc<str>>, input: &'a str) -> CraeftResult<Self> {
        let file = file.into();
        let mut lexer = Lexer {
            input: input.as_bytes(),
            file: file.clone(),
            position: 0,
            line: 1,
            col: 1,
            current: Token::new(TokenKind::Eof, SourcePos::new(file, 1, 1)),
        };
        lexer.shift()?;
        Ok(lexer)
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn pos(&self) -> SourcePos {
        SourcePos::new(self.file.clone(), self.line, self.col)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self) -> Option<char> {
        std::str::from_utf8(&self.input[self.position..])
            .ok()
            .and_then(|s| s.chars().next())
    }

    /// Advance one byte, updating line/column bookkeeping.
    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.position += 1;
        if b == b'\n' || b == b'\r' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn eat_whitespace(&mut self) {
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Advance the lexer to the next token, replacing `current`.
    pub fn shift(&mut self) -> CraeftResult<()> {
        self.eat_whitespace();
        let start = self.pos();

        let Some(c) = self.peek_char() else {
            self.current = Token::new(TokenKind::Eof, start);
            return Ok(());
        };

        let kind = if c.is_ascii_uppercase() {
            self.lex_type_name()
        } else if c.is_ascii_lowercase() || (!c.is_ascii() && c.is_alphabetic()) {
            self.lex_ident_or_keyword()
        } else if c.is_ascii_digit() {
            self.lex_number()
        } else if is_opchar(c) {
            self.lex_operator()
        } else {
            match c {
                '(' => {
                    self.advance();
                    Ok(TokenKind::OpenParen)
                }
                ')' => {
                    self.advance();
                    Ok(TokenKind::CloseParen)
                }
                '{' => {
                    self.advance();
                    Ok(TokenKind::OpenBrace)
                }
                '}' => {
                    self.advance();
                    Ok(TokenKind::CloseBrace)
                }
                ',' => {
                    self.advance();
                    Ok(TokenKind::Comma)
                }
                ';' => {
                    self.advance();
                    Ok(TokenKind::Semicolon)
                }
                '"' => self.lex_string(),
                other => Err(CraeftError::lexer(
                    format!("character \"{other}\" not recognized"),
                    start.clone(),
                )),
            }
        }?;

        trace!("lexed {kind} at {start}");
        self.current = Token::new(kind, start);
        Ok(())
    }

    fn lex_type_name(&mut self) -> CraeftResult<TokenKind> {
        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(TokenKind::TypeName(s))
    }

    fn lex_ident_or_keyword(&mut self) -> CraeftResult<TokenKind> {
        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(TokenKind::keyword(&s).unwrap_or(TokenKind::Identifier(s)))
    }

    fn lex_number(&mut self) -> CraeftResult<TokenKind> {
        let mut int_part: u64 = 0;
        while let Some(c) = self.peek_char() {
            if let Some(d) = c.to_digit(10) {
                int_part = int_part.wrapping_mul(10).wrapping_add(d as u64);
                self.advance();
            } else {
                break;
            }
        }

        let mut is_float = false;
        let mut value = int_part as f64;

        if self.peek_char() == Some('.') {
            is_float = true;
            self.advance();
            let mut place = 0.1_f64;
            while let Some(c) = self.peek_char() {
                if let Some(d) = c.to_digit(10) {
                    value += d as f64 * place;
                    place *= 0.1;
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            let mut neg = false;
            if self.peek_char() == Some('-') {
                neg = true;
                self.advance();
            } else if self.peek_char() == Some('+') {
                self.advance();
            }
            let mut exp: i32 = 0;
            while let Some(c) = self.peek_char() {
                if let Some(d) = c.to_digit(10) {
                    exp = exp * 10 + d as i32;
                    self.advance();
                } else {
                    break;
                }
            }
            if neg {
                exp = -exp;
            }
            value *= 10f64.powi(exp);
        }

        if is_float {
            Ok(TokenKind::FloatLiteral(value))
        } else {
            Ok(TokenKind::UIntLiteral(int_part))
        }
    }

    fn lex_operator(&mut self) -> CraeftResult<TokenKind> {
        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if is_opchar(c) {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(TokenKind::Operator(s))
    }

    fn lex_string(&mut self) -> CraeftResult<TokenKind> {
        let start = self.pos();
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(CraeftError::lexer("unterminated string", start));
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        None => return Err(CraeftError::lexer("unterminated string", start)),
                        Some(escaped) => {
                            self.advance();
                            s.push(match escaped {
                                'a' => '\u{07}',
                                'b' => '\u{08}',
                                'f' => '\u{0C}',
                                'n' => '\n',
                                'r' => '\r',
                                't' => '\t',
                                'v' => '\u{0B}',
                                other => other,
                            });
                        }
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::StringLiteral(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new("test.cr", input).expect("lexer construction");
        let mut out = Vec::new();
        loop {
            out.push(lexer.current.kind.clone());
            if lexer.at_eof() {
                break;
            }
            lexer.shift().expect("shift");
        }
        out
    }

    #[test]
    fn test_lex_alphabetic_id() {
        assert_eq!(
            lex_all("foo"),
            vec![TokenKind::Identifier("foo".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_type_name() {
        assert_eq!(
            lex_all("Point"),
            vec![TokenKind::TypeName("Point".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_numeric() {
        assert_eq!(
            lex_all("42"),
            vec![TokenKind::UIntLiteral(42), TokenKind::Eof]
        );
        assert_eq!(
            lex_all("3.5"),
            vec![TokenKind::FloatLiteral(3.5), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_keywords() {
        assert_eq!(
            lex_all("fn return if else struct type while"),
            vec![
                TokenKind::Fn,
                TokenKind::Return,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Struct,
                TokenKind::Type,
                TokenKind::While,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_operators_greedy() {
        assert_eq!(
            lex_all("== <= -> <: :> &&"),
            vec![
                TokenKind::Operator("==".into()),
                TokenKind::Operator("<=".into()),
                TokenKind::Operator("->".into()),
                TokenKind::Operator("<:".into()),
                TokenKind::Operator(":>".into()),
                TokenKind::Operator("&&".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_string_escapes() {
        assert_eq!(
            lex_all(r#""a\nb""#),
            vec![TokenKind::StringLiteral("a\nb".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_unterminated_string_errors() {
        let err = Lexer::new("test.cr", "\"abc").unwrap_err();
        assert_eq!(
            err,
            CraeftError::lexer("unterminated string", SourcePos::new("test.cr", 1, 1))
        );
    }

    #[test]
    fn test_lex_unknown_char_errors() {
        let err = Lexer::new("test.cr", "`").unwrap_err();
        assert_eq!(err.msg, "character \"`\" not recognized");
    }
}
