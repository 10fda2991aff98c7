//! Recursive-descent trigger parser.
//!
//! ```text
//! expr  := term (join term)*
//! term  := '^'? '(' expr ')' | '^'? name | name op number
//!        | name ':' number ',' number | name '@' number ',' number
//! join  := '&' | '|'
//! ```
//!
//! Terms are folded left to right through a [`Composer`], so every
//! (sub)expression starts with an implicit OR. Negation binds to a
//! parenthesized group or a bare flag only.

use crate::error::{ErrorCode, TillerError, TillerResult};
use crate::predicates::{Combinator, Composer, Condition};
use crate::trigger::lexer::{tokenize, Token, TokenKind};
use std::collections::HashSet;
use tracing::debug;

/// Default radius for `name @ lat,lon` proximity terms, in metres.
pub const DEFAULT_NEAR_RADIUS: f64 = 3.0;

/// Compiles trigger text into a [`Condition`].
#[derive(Debug, Clone)]
pub struct TriggerParser {
    known_states: Option<HashSet<String>>,
    near_radius: f64,
}

impl Default for TriggerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerParser {
    /// A parser that accepts any state name.
    pub fn new() -> Self {
        Self {
            known_states: None,
            near_radius: DEFAULT_NEAR_RADIUS,
        }
    }

    /// Reject names outside `names` at parse time.
    pub fn with_known_states<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_states = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Radius used by proximity terms.
    pub fn with_near_radius(mut self, radius: f64) -> Self {
        self.near_radius = radius;
        self
    }

    /// Parse a trigger. Any malformed part fails the whole trigger.
    pub fn parse(&self, text: &str) -> TillerResult<Condition> {
        let tokens = tokenize(text)?;
        let mut cursor = Cursor {
            tokens: &tokens,
            pos: 0,
            parser: self,
        };

        let condition = cursor.expression()?;
        let rest = cursor.peek();
        match rest.kind {
            TokenKind::End => {}
            TokenKind::RParen => {
                return Err(TillerError::syntax(
                    ErrorCode::TrgUnbalanced,
                    "unmatched ')'",
                    rest.offset,
                ))
            }
            _ => return Err(unexpected(rest, "end of trigger")),
        }

        debug!(trigger = text, condition = %condition, "Trigger compiled");
        Ok(condition)
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    parser: &'a TriggerParser,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> &'a Token {
        // The token list always ends with `End` and the cursor never passes it.
        let tokens: &'a [Token] = self.tokens;
        &tokens[self.pos.min(tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if token.kind != TokenKind::End {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self) -> TillerResult<Condition> {
        let first = self.peek();
        if matches!(first.kind, TokenKind::End | TokenKind::RParen) {
            return Err(TillerError::syntax(
                ErrorCode::TrgEmpty,
                "empty expression",
                first.offset,
            ));
        }

        let mut composer = Composer::new();
        let mut join = Combinator::Or;
        loop {
            let term = self.term()?;
            composer = composer.combine(join, term);

            match self.peek().kind {
                TokenKind::Join(next) => {
                    self.advance();
                    join = next;
                }
                _ => break,
            }
        }
        Ok(composer.finish())
    }

    fn term(&mut self) -> TillerResult<Condition> {
        let negated = if self.peek().kind == TokenKind::Caret {
            self.advance();
            true
        } else {
            false
        };

        let token = self.advance();
        let condition = match &token.kind {
            TokenKind::LParen => {
                let inner = self.expression()?;
                let close = self.advance();
                if close.kind != TokenKind::RParen {
                    return Err(TillerError::syntax(
                        ErrorCode::TrgUnbalanced,
                        "missing ')'",
                        close.offset,
                    ));
                }
                inner
            }
            TokenKind::Ident(name) => {
                let atom = self.atom(name, token.offset)?;
                if negated && !matches!(atom, Condition::Flag { .. }) {
                    return Err(TillerError::syntax(
                        ErrorCode::TrgUnexpectedToken,
                        "'^' applies only to a parenthesized group or a bare flag",
                        token.offset,
                    ));
                }
                atom
            }
            _ => return Err(unexpected(token, "a state name or '('")),
        };

        Ok(if negated {
            condition.negate()
        } else {
            condition
        })
    }

    fn atom(&mut self, name: &str, offset: usize) -> TillerResult<Condition> {
        match self.peek().kind {
            TokenKind::Compare(op) => {
                self.check_name(name, offset)?;
                self.advance();
                let value = self.number()?;
                Ok(Condition::compare(name, op, value))
            }
            TokenKind::Colon => {
                self.check_name(name, offset)?;
                self.advance();
                let ((low, high), low_offset) = self.number_pair()?;
                if low > high {
                    return Err(TillerError::syntax(
                        ErrorCode::TrgInvalidNumber,
                        format!("interval bounds out of order: {} > {}", low, high),
                        low_offset,
                    ));
                }
                Ok(Condition::interval(name, low, high))
            }
            TokenKind::At => {
                // The left-hand name only labels the target location.
                self.advance();
                let ((lat, lon), pair_offset) = self.number_pair()?;
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(TillerError::syntax(
                        ErrorCode::TrgInvalidNumber,
                        format!("location out of range: {}, {}", lat, lon),
                        pair_offset,
                    ));
                }
                Ok(Condition::near_lat_lon(lat, lon, self.parser.near_radius))
            }
            _ => {
                self.check_name(name, offset)?;
                Ok(Condition::flag(name))
            }
        }
    }

    fn number(&mut self) -> TillerResult<f64> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(v) => Ok(v),
            _ => Err(unexpected(token, "a number")),
        }
    }

    /// `number ',' number`, with the offset of the first number.
    fn number_pair(&mut self) -> TillerResult<((f64, f64), usize)> {
        let offset = self.peek().offset;
        let first = self.number()?;
        let comma = self.advance();
        if comma.kind != TokenKind::Comma {
            return Err(unexpected(comma, "','"));
        }
        let second = self.number()?;
        Ok(((first, second), offset))
    }

    fn check_name(&self, name: &str, offset: usize) -> TillerResult<()> {
        match &self.parser.known_states {
            Some(known) if !known.contains(name) => Err(TillerError::syntax(
                ErrorCode::TrgUnknownState,
                format!("unknown state '{}'", name),
                offset,
            )),
            _ => Ok(()),
        }
    }
}

fn unexpected(token: &Token, expected: &str) -> TillerError {
    let found = match &token.kind {
        TokenKind::End => "end of trigger".to_string(),
        other => format!("{:?}", other),
    };
    TillerError::syntax(
        ErrorCode::TrgUnexpectedToken,
        format!("expected {}, found {}", expected, found),
        token.offset,
    )
}
