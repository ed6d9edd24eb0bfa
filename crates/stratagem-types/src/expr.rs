//! Typed trigger expression tree.
//!
//! Triggers arrive as text from the planner, are parsed once at validation
//! time, and are stored in the admitted plan as a [`BoolExpr`]. Composition
//! is explicit (`And`/`Or` nodes), so evaluation never depends on operator
//! precedence.

use serde::{Deserialize, Serialize};

use crate::enums::{Comparator, Fact};

/// Reference to a fact by name.
///
/// Names outside the known vocabulary are kept verbatim so that evaluation
/// can fail closed on them instead of the plan being silently rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactRef {
    /// A fact in the known vocabulary.
    Known(Fact),
    /// A name that matches no known fact.
    Unknown(String),
}

impl FactRef {
    /// Resolve a fact name, keeping unrecognized names as [`FactRef::Unknown`].
    pub fn parse(name: &str) -> Self {
        Fact::from_name(name).map_or_else(|| Self::Unknown(name.trim().to_owned()), Self::Known)
    }

    /// The name as written in a trigger.
    pub fn name(&self) -> &str {
        match self {
            Self::Known(fact) => fact.as_str(),
            Self::Unknown(name) => name,
        }
    }
}

/// A boolean expression over world facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoolExpr {
    /// Leaf comparison `fact <op> value`.
    Compare {
        /// The fact on the left-hand side.
        fact: FactRef,
        /// The comparison operator.
        op: Comparator,
        /// The threshold on the right-hand side.
        value: f64,
    },
    /// True when every child is true (true when empty).
    And(Vec<BoolExpr>),
    /// True when any child is true (false when empty).
    Or(Vec<BoolExpr>),
}

impl BoolExpr {
    /// Build a leaf comparison against a known fact.
    pub const fn compare(fact: Fact, op: Comparator, value: f64) -> Self {
        Self::Compare {
            fact: FactRef::Known(fact),
            op,
            value,
        }
    }

    /// Nesting depth; a single comparison has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::Compare { .. } => 1,
            Self::And(children) | Self::Or(children) => children
                .iter()
                .map(Self::depth)
                .max()
                .unwrap_or(0)
                .saturating_add(1),
        }
    }

    /// Number of leaf comparisons in the tree.
    pub fn term_count(&self) -> usize {
        match self {
            Self::Compare { .. } => 1,
            Self::And(children) | Self::Or(children) => children
                .iter()
                .map(Self::term_count)
                .fold(0_usize, usize::saturating_add),
        }
    }

    /// Names of all facts outside the known vocabulary, in tree order.
    pub fn unknown_facts(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_unknown(&mut names);
        names
    }

    fn collect_unknown<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Compare {
                fact: FactRef::Unknown(name),
                ..
            } => out.push(name),
            Self::Compare { .. } => {}
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_unknown(out);
                }
            }
        }
    }
}

impl core::fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Compare { fact, op, value } => write!(f, "{} {op} {value}", fact.name()),
            Self::And(children) | Self::Or(children) => {
                let joiner = if matches!(self, Self::And(_)) { " AND " } else { " OR " };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> BoolExpr {
        BoolExpr::And(vec![
            BoolExpr::compare(Fact::HealthPct, Comparator::Lt, 20.0),
            BoolExpr::Or(vec![
                BoolExpr::compare(Fact::EnemyDist, Comparator::Lt, 10.0),
                BoolExpr::Compare {
                    fact: FactRef::parse("morale"),
                    op: Comparator::Gt,
                    value: 1.0,
                },
            ]),
        ])
    }

    #[test]
    fn depth_and_terms() {
        let expr = nested();
        assert_eq!(expr.depth(), 3);
        assert_eq!(expr.term_count(), 3);
        assert_eq!(BoolExpr::And(Vec::new()).depth(), 1);
    }

    #[test]
    fn unknown_facts_are_collected() {
        assert_eq!(nested().unknown_facts(), vec!["morale"]);
    }

    #[test]
    fn display_is_fully_parenthesized() {
        assert_eq!(
            nested().to_string(),
            "(health_pct < 20 AND (enemy_dist < 10 OR morale > 1))"
        );
    }
}
