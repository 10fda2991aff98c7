//! Left-to-right composition of condition terms.
//!
//! A composition starts from the constant `false`. Every term is folded onto
//! the tree built so far, so `or(a).or(b).and(c)` is `(a | b) & c`. Because
//! the starting value is `false`, the first fold is always an OR even when an
//! AND is requested; an AND with `false` would make the whole composition
//! unsatisfiable. Build `a | (b & c)` as two compositions joined with
//! [`Condition::or`].

use crate::predicates::condition::Condition;
use strum::{Display, EnumString};

/// Boolean combinator joining a term onto a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Combinator {
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "|")]
    Or,
}

/// Folds terms onto a condition tree, left to right.
#[derive(Debug, Clone)]
pub struct Composer {
    tree: Condition,
    terms: usize,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    pub fn new() -> Self {
        Self {
            tree: Condition::Const(false),
            terms: 0,
        }
    }

    pub fn and(self, term: Condition) -> Self {
        self.combine(Combinator::And, term)
    }

    pub fn or(self, term: Condition) -> Self {
        self.combine(Combinator::Or, term)
    }

    /// Fold one term onto the tree.
    pub fn combine(mut self, combinator: Combinator, term: Condition) -> Self {
        let effective = if self.terms == 0 {
            Combinator::Or
        } else {
            combinator
        };
        self.tree = match effective {
            Combinator::And => self.tree.and(term),
            Combinator::Or => self.tree.or(term),
        };
        self.terms += 1;
        self
    }

    /// Number of terms folded so far.
    pub fn terms(&self) -> usize {
        self.terms
    }

    pub fn finish(self) -> Condition {
        self.tree
    }
}
