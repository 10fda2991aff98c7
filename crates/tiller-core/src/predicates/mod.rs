//! Condition trees and the composer that builds them.

mod composer;
mod condition;

pub use composer::{Combinator, Composer};
pub use condition::{CompareOp, Condition};
