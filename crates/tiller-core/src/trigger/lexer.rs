//! Tokenizer for trigger text.

use crate::error::{ErrorCode, TillerError, TillerResult};
use crate::predicates::{Combinator, CompareOp};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Compare(CompareOp),
    Join(Combinator),
    Colon,
    At,
    Comma,
    LParen,
    RParen,
    Caret,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset into the source text.
    pub offset: usize,
}

/// Split trigger text into tokens, ending with [`TokenKind::End`].
pub(crate) fn tokenize(text: &str) -> TillerResult<Vec<Token>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let kind = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b'^' => {
                i += 1;
                TokenKind::Caret
            }
            b':' => {
                i += 1;
                TokenKind::Colon
            }
            b'@' => {
                i += 1;
                TokenKind::At
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b'&' | b'|' => {
                // Runs of the same symbol (`&&`, `||`) count as one combinator.
                while i < bytes.len() && bytes[i] == c {
                    i += 1;
                }
                if i < bytes.len() && matches!(bytes[i], b'&' | b'|') {
                    return Err(TillerError::syntax(
                        ErrorCode::TrgUnexpectedToken,
                        "mixed '&' and '|' with no term between them",
                        i,
                    ));
                }
                TokenKind::Join(if c == b'&' {
                    Combinator::And
                } else {
                    Combinator::Or
                })
            }
            b'<' | b'>' | b'=' | b'!' => {
                i += 1;
                if i < bytes.len() && bytes[i] == b'=' {
                    i += 1;
                }
                let symbol = &text[start..i];
                let op = symbol.parse::<CompareOp>().map_err(|_| {
                    TillerError::syntax(
                        ErrorCode::TrgUnexpectedToken,
                        format!("unknown operator '{}'", symbol),
                        start,
                    )
                })?;
                TokenKind::Compare(op)
            }
            b'0'..=b'9' | b'.' | b'-' | b'+' => {
                i = scan_number(bytes, i);
                let literal = &text[start..i];
                let value = literal.parse::<f64>().map_err(|_| {
                    TillerError::syntax(
                        ErrorCode::TrgInvalidNumber,
                        format!("invalid number '{}'", literal),
                        start,
                    )
                })?;
                TokenKind::Number(value)
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                TokenKind::Ident(text[start..i].to_string())
            }
            _ => {
                let found = text[start..].chars().next().unwrap_or('?');
                return Err(TillerError::syntax(
                    ErrorCode::TrgUnexpectedToken,
                    format!("unexpected character '{}'", found),
                    start,
                ));
            }
        };
        tokens.push(Token { kind, offset: start });
    }

    tokens.push(Token {
        kind: TokenKind::End,
        offset: text.len(),
    });
    Ok(tokens)
}

/// Scan a numeric literal: optional sign, digits, fraction, exponent.
fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    if matches!(bytes[i], b'-' | b'+') {
        i += 1;
    }
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'-' | b'+') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_comparison_tokens() {
        assert_eq!(
            kinds("EC >= 1000"),
            vec![
                TokenKind::Ident("EC".into()),
                TokenKind::Compare(CompareOp::Ge),
                TokenKind::Number(1000.0),
                TokenKind::End,
            ]
        );
        assert_eq!(kinds("a!=2")[1], TokenKind::Compare(CompareOp::Ne));
        assert_eq!(kinds("a==2")[1], TokenKind::Compare(CompareOp::Eq));
        assert_eq!(kinds("a=2")[1], TokenKind::Compare(CompareOp::Eq));
    }

    #[test]
    fn test_negative_and_exponent_numbers() {
        assert_eq!(
            kinds("p @ -33.5,1.5e2"),
            vec![
                TokenKind::Ident("p".into()),
                TokenKind::At,
                TokenKind::Number(-33.5),
                TokenKind::Comma,
                TokenKind::Number(150.0),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_doubled_combinators() {
        assert_eq!(
            kinds("a && b || c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Join(Combinator::And),
                TokenKind::Ident("b".into()),
                TokenKind::Join(Combinator::Or),
                TokenKind::Ident("c".into()),
                TokenKind::End,
            ]
        );
        assert!(tokenize("a &| b").is_err());
    }

    #[test]
    fn test_offsets() {
        let tokens = tokenize("  a & (b)").unwrap();
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![2, 4, 6, 7, 8, 9]);
    }

    #[test]
    fn test_bad_characters() {
        let err = tokenize("a # b").unwrap_err();
        match err {
            TillerError::Syntax { position, .. } => assert_eq!(position, 2),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(tokenize("a ! b").is_err());
        assert!(tokenize("x > 1.2.3").is_err());
    }
}
