//! Trigger parsing and evaluation.
//!
//! Triggers are parsed exactly once, when a plan is validated, into a
//! [`BoolExpr`] tree. At runtime the executor evaluates the stored tree
//! against the tick's [`WorldSnapshot`]; nothing is re-parsed.
//!
//! # Text Syntax
//!
//! A text trigger is one or more comparisons `fact <op> number` joined by a
//! single kind of connector:
//!
//! ```text
//! enemy_dist < 10
//! health_pct <= 20 AND ammo < 1
//! enemy_count >= 3 || ally_count == 0
//! ```
//!
//! Operators are `<`, `>`, `<=`, `>=`, `==` (a lone `=` reads as `==`).
//! Connectors are `AND`/`OR` in any case, or `&&`/`||`. Mixing `AND` with
//! `OR` in one string is rejected: nesting must be spelled out with an
//! explicit `{"and": [...]}` / `{"or": [...]}` tree, so there is no
//! precedence to get wrong.
//!
//! # Evaluation
//!
//! Evaluation fails closed. An unknown fact, or a fact the entity does not
//! currently have (no enemy sensed, no ammo pool), makes the whole trigger
//! evaluate to `false`. [`try_evaluate`] reports the reason so the caller
//! can log it; [`evaluate`] swallows it.

use stratagem_types::{BoolExpr, Comparator, EntityId, Fact, FactRef, RawTrigger, WorldSnapshot};

/// Errors produced while parsing a trigger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerParseError {
    /// The trigger text is blank.
    #[error("trigger is empty")]
    Empty,

    /// A clause is not of the form `fact <op> number`.
    #[error("malformed comparison `{text}`: expected `fact <op> number`")]
    Malformed {
        /// The offending clause.
        text: String,
    },

    /// The right-hand side of a comparison is not a finite number.
    #[error("invalid number `{text}`")]
    InvalidNumber {
        /// The offending literal.
        text: String,
    },

    /// A text trigger uses both `AND` and `OR`.
    #[error("cannot mix AND and OR in one expression; use an explicit tree")]
    MixedConnectors,

    /// An explicit tree node has no children.
    #[error("empty `{connector}` group")]
    EmptyGroup {
        /// `"and"` or `"or"`.
        connector: &'static str,
    },

    /// The tree nests deeper than allowed.
    #[error("trigger depth {depth} exceeds maximum of {max}")]
    TooDeep {
        /// Depth of the parsed tree.
        depth: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The tree has more comparisons than allowed.
    #[error("trigger has {terms} comparisons, maximum is {max}")]
    TooManyTerms {
        /// Comparisons in the parsed tree.
        terms: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Errors produced while evaluating a trigger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerEvaluationError {
    /// The trigger references a fact outside the known vocabulary.
    #[error("unknown fact `{name}`")]
    UnknownFact {
        /// The name as written.
        name: String,
    },

    /// The entity has no value for the fact at this tick.
    #[error("fact `{fact}` is unavailable")]
    FactUnavailable {
        /// The missing fact.
        fact: Fact,
    },
}

/// Size limits applied to parsed triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerLimits {
    /// Maximum nesting depth (a single comparison has depth 1).
    pub max_depth: usize,
    /// Maximum number of comparisons.
    pub max_terms: usize,
}

/// Connector joining the clauses of a text trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    And,
    Or,
}

impl Connector {
    fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("and") || token == "&&" {
            Some(Self::And)
        } else if token.eq_ignore_ascii_case("or") || token == "||" {
            Some(Self::Or)
        } else {
            None
        }
    }
}

/// Parse a planner trigger into a typed expression tree.
///
/// Unknown fact names are kept as [`FactRef::Unknown`]; whether they are
/// acceptable is the validator's decision.
///
/// # Errors
///
/// Returns a [`TriggerParseError`] describing the first syntax or size
/// violation found.
pub fn parse_trigger(raw: &RawTrigger, limits: &TriggerLimits) -> Result<BoolExpr, TriggerParseError> {
    let expr = parse_node(raw, 1, limits.max_depth)?;

    let depth = expr.depth();
    if depth > limits.max_depth {
        return Err(TriggerParseError::TooDeep {
            depth,
            max: limits.max_depth,
        });
    }

    let terms = expr.term_count();
    if terms > limits.max_terms {
        return Err(TriggerParseError::TooManyTerms {
            terms,
            max: limits.max_terms,
        });
    }

    Ok(expr)
}

/// Parse the node at nesting `level` (the root is 1). A group is rejected
/// before its children are visited once it cannot fit under `max_depth`.
fn parse_node(raw: &RawTrigger, level: usize, max_depth: usize) -> Result<BoolExpr, TriggerParseError> {
    let (children, connector, group): (_, _, fn(Vec<BoolExpr>) -> BoolExpr) = match raw {
        RawTrigger::Text(text) => return parse_text(text),
        RawTrigger::All { and } => (and, "and", BoolExpr::And),
        RawTrigger::Any { or } => (or, "or", BoolExpr::Or),
    };

    let depth = level.saturating_add(1);
    if depth > max_depth {
        return Err(TriggerParseError::TooDeep { depth, max: max_depth });
    }
    if children.is_empty() {
        return Err(TriggerParseError::EmptyGroup { connector });
    }
    children
        .iter()
        .map(|child| parse_node(child, depth, max_depth))
        .collect::<Result<Vec<_>, _>>()
        .map(group)
}

fn parse_text(text: &str) -> Result<BoolExpr, TriggerParseError> {
    // Pad symbolic connectors so they split like words.
    let spaced = text.replace("&&", " && ").replace("||", " || ");

    let mut clauses: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut connector: Option<Connector> = None;

    for token in spaced.split_whitespace() {
        if let Some(found) = Connector::from_token(token) {
            if connector.is_some_and(|c| c != found) {
                return Err(TriggerParseError::MixedConnectors);
            }
            connector = Some(found);
            if current.is_empty() {
                return Err(TriggerParseError::Malformed {
                    text: text.trim().to_owned(),
                });
            }
            clauses.push(current.join(" "));
            current.clear();
        } else {
            current.push(token);
        }
    }

    if current.is_empty() {
        if clauses.is_empty() {
            return Err(TriggerParseError::Empty);
        }
        // Dangling connector.
        return Err(TriggerParseError::Malformed {
            text: text.trim().to_owned(),
        });
    }
    clauses.push(current.join(" "));

    let mut leaves = clauses
        .iter()
        .map(|clause| parse_comparison(clause))
        .collect::<Result<Vec<_>, _>>()?;

    match connector {
        None => leaves.pop().ok_or(TriggerParseError::Empty),
        Some(Connector::And) => Ok(BoolExpr::And(leaves)),
        Some(Connector::Or) => Ok(BoolExpr::Or(leaves)),
    }
}

fn parse_comparison(clause: &str) -> Result<BoolExpr, TriggerParseError> {
    let malformed = || TriggerParseError::Malformed {
        text: clause.to_owned(),
    };

    let op_start = clause.find(['<', '>', '=']).ok_or_else(malformed)?;
    let fact_name = clause.get(..op_start).ok_or_else(malformed)?.trim();
    let rest = clause.get(op_start..).ok_or_else(malformed)?;

    let (op, literal) = [
        ("<=", Comparator::Le),
        (">=", Comparator::Ge),
        ("==", Comparator::Eq),
        ("<", Comparator::Lt),
        (">", Comparator::Gt),
        ("=", Comparator::Eq),
    ]
    .into_iter()
    .find_map(|(symbol, op)| rest.strip_prefix(symbol).map(|tail| (op, tail.trim())))
    .ok_or_else(malformed)?;

    if !is_identifier(fact_name) || literal.is_empty() {
        return Err(malformed());
    }

    let value: f64 = literal
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| TriggerParseError::InvalidNumber {
            text: literal.to_owned(),
        })?;

    Ok(BoolExpr::Compare {
        fact: FactRef::parse(fact_name),
        op,
        value,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Inputs to one trigger evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// The tick's world snapshot, shared by every entity.
    pub snapshot: &'a WorldSnapshot,
    /// The entity whose facts are read.
    pub entity_id: EntityId,
    /// Seconds since the entity's current step started (the `time` fact).
    pub step_elapsed_secs: f64,
}

impl EvalContext<'_> {
    fn fact(&self, fact: &FactRef) -> Result<f64, TriggerEvaluationError> {
        let fact = match fact {
            FactRef::Known(fact) => *fact,
            FactRef::Unknown(name) => {
                return Err(TriggerEvaluationError::UnknownFact { name: name.clone() });
            }
        };

        if fact == Fact::Time {
            return Ok(self.step_elapsed_secs);
        }

        self.snapshot
            .view(self.entity_id)
            .and_then(|view| view.fact(fact))
            .ok_or(TriggerEvaluationError::FactUnavailable { fact })
    }
}

/// Evaluate a trigger, reporting why it could not be evaluated.
///
/// Every child of an `And`/`Or` node is evaluated, so a fault anywhere in
/// the tree is reported regardless of the other children's values.
///
/// # Errors
///
/// Returns the first [`TriggerEvaluationError`] met in tree order.
pub fn try_evaluate(expr: &BoolExpr, ctx: &EvalContext<'_>) -> Result<bool, TriggerEvaluationError> {
    match expr {
        BoolExpr::Compare { fact, op, value } => Ok(op.apply(ctx.fact(fact)?, *value)),
        BoolExpr::And(children) => {
            let mut result = true;
            for child in children {
                result &= try_evaluate(child, ctx)?;
            }
            Ok(result)
        }
        BoolExpr::Or(children) => {
            let mut result = false;
            for child in children {
                result |= try_evaluate(child, ctx)?;
            }
            Ok(result)
        }
    }
}

/// Evaluate a trigger, failing closed.
///
/// Returns `false` whenever [`try_evaluate`] would return an error.
pub fn evaluate(expr: &BoolExpr, ctx: &EvalContext<'_>) -> bool {
    try_evaluate(expr, ctx).unwrap_or(false)
}
