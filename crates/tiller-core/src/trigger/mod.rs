//! The trigger language.
//!
//! A trigger is a line of text such as `EC > 1000 & jars_available` or
//! `is_autonomous & ^(is_going_home | is_taking_sample)`, compiled into a
//! [`Condition`](crate::predicates::Condition) tree.

mod lexer;
mod parser;

pub use parser::{TriggerParser, DEFAULT_NEAR_RADIUS};

use crate::error::TillerResult;
use crate::predicates::Condition;

/// Parse with a default [`TriggerParser`].
pub fn parse_trigger(text: &str) -> TillerResult<Condition> {
    TriggerParser::new().parse(text)
}
