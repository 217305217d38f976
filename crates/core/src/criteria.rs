//! Criteria: backend-agnostic boolean expressions over document fields
//!
//! A [`Criteria`] is an immutable tree. The relational engine compiles it to
//! a SQL predicate; the in-memory reference store evaluates it directly with
//! [`Criteria::evaluate`]. Both follow SQL three-valued logic: a comparison
//! that touches a missing or null value is *unknown*, and only rows whose
//! criteria evaluate to *true* are selected.
//!
//! Field names are logical: a dotted document path (`address.city`), a
//! projected column's path, or one of the reserved names [`ID_FIELD`],
//! [`SEQ_ID_FIELD`], [`REVISION_FIELD`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::json::{get_at_path, JsonPath};

/// Reserved field name for the document id
pub const ID_FIELD: &str = "_id";
/// Reserved field name for the backend-assigned sequence id
pub const SEQ_ID_FIELD: &str = "_seq";
/// Reserved field name for the revision counter
pub const REVISION_FIELD: &str = "_rev";

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// SQL operator token
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Boolean expression tree over document fields and constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Criteria {
    /// `field <op> value`
    Compare {
        /// Logical field name
        field: String,
        /// Operator
        op: CompareOp,
        /// Constant operand
        value: Value,
    },
    /// `field IS NULL` (absent and stored-null are indistinguishable)
    IsNull(String),
    /// `field IS NOT NULL`
    IsNotNull(String),
    /// `field IN (values...)`; an empty list matches nothing
    In {
        /// Logical field name
        field: String,
        /// Candidate constants
        values: Vec<Value>,
    },
    /// Conjunction; empty is true
    And(Vec<Criteria>),
    /// Disjunction; empty is false
    Or(Vec<Criteria>),
    /// Negation
    Not(Box<Criteria>),
    /// Constant truth value
    Const(bool),
}

impl Criteria {
    /// Matches every row
    pub fn all() -> Self {
        Criteria::Const(true)
    }

    /// Matches no row
    pub fn none() -> Self {
        Criteria::Const(false)
    }

    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Criteria::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// `field <> value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// `field <= value`
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// `field >= value`
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Criteria::IsNull(field.into())
    }

    /// `field IS NOT NULL`
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Criteria::IsNotNull(field.into())
    }

    /// `field IN (values...)`
    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Criteria::In {
            field: field.into(),
            values,
        }
    }

    /// Conjunction of `parts`
    pub fn and(parts: Vec<Criteria>) -> Self {
        Criteria::And(parts)
    }

    /// Disjunction of `parts`
    pub fn or(parts: Vec<Criteria>) -> Self {
        Criteria::Or(parts)
    }

    /// Negation of `inner`
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Criteria) -> Self {
        Criteria::Not(Box::new(inner))
    }

    /// Evaluate with three-valued logic
    ///
    /// `lookup` resolves a logical field name to its current value (`None`
    /// when absent). Returns `Some(true)`, `Some(false)` or `None` for
    /// unknown.
    pub fn evaluate<F>(&self, lookup: &F) -> Option<bool>
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            Criteria::Compare { field, op, value } => {
                let actual = non_null(lookup(field))?;
                if value.is_null() {
                    return None;
                }
                Some(match compare_values(&actual, value) {
                    Some(ordering) => op.accepts(ordering),
                    None => *op == CompareOp::Ne,
                })
            }
            Criteria::IsNull(field) => Some(non_null(lookup(field)).is_none()),
            Criteria::IsNotNull(field) => Some(non_null(lookup(field)).is_some()),
            Criteria::In { field, values } => {
                if values.is_empty() {
                    return Some(false);
                }
                let actual = non_null(lookup(field))?;
                let mut saw_null = false;
                for candidate in values {
                    if candidate.is_null() {
                        saw_null = true;
                    } else if compare_values(&actual, candidate) == Some(Ordering::Equal) {
                        return Some(true);
                    }
                }
                if saw_null {
                    None
                } else {
                    Some(false)
                }
            }
            Criteria::And(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(lookup) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }
            Criteria::Or(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(lookup) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Criteria::Not(inner) => inner.evaluate(lookup).map(|b| !b),
            Criteria::Const(b) => Some(*b),
        }
    }

    /// True if `document` is selected, looking fields up as body paths
    ///
    /// Field names that do not parse as paths never match.
    pub fn matches(&self, document: &Value) -> bool {
        let lookup = |field: &str| {
            field
                .parse::<JsonPath>()
                .ok()
                .and_then(|path| get_at_path(document, &path).cloned())
        };
        self.evaluate(&lookup) == Some(true)
    }
}

fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

/// Compare two non-null JSON values of the same kind
///
/// Numbers compare numerically, strings by bytes, booleans false < true.
/// Values of different kinds, arrays and objects are incomparable except
/// for structural equality.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return Some(x.cmp(&y));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}
