//! Predicate syntax tree and its fluent builder.

use entimap_codec::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators.
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
    /// SQL token for the operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// String methods a predicate may call on a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// `LIKE 'v%'`
    StartsWith,
    /// `LIKE '%v'`
    EndsWith,
    /// `LIKE '%v%'`
    Contains,
    /// `= v`
    Equals,
    /// Any other method; not translatable.
    Other(String),
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartsWith => f.write_str("StartsWith"),
            Self::EndsWith => f.write_str("EndsWith"),
            Self::Contains => f.write_str("Contains"),
            Self::Equals => f.write_str("Equals"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A property of the queried entity or of a joined entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyRef {
    /// Owning entity or navigation; `None` is the queried entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Property name.
    pub name: String,
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// A mapped property.
    Property(PropertyRef),
    /// A literal value.
    Constant(Value),
}

/// A boolean expression over one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Binary comparison.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left side.
        left: Operand,
        /// Right side.
        right: Operand,
    },
    /// Conjunction.
    And(Box<Predicate>, Box<Predicate>),
    /// Disjunction.
    Or(Box<Predicate>, Box<Predicate>),
    /// Negation. Representable, but not translatable.
    Not(Box<Predicate>),
    /// String method call on a property.
    Method {
        /// Method.
        kind: MethodKind,
        /// Property the method is called on.
        target: PropertyRef,
        /// Argument.
        literal: Value,
    },
    /// `true` or `false`.
    Literal(bool),
}

/// Binding strength used to decide on parentheses.
pub(crate) const PREC_OR: u8 = 1;
pub(crate) const PREC_AND: u8 = 2;
pub(crate) const PREC_ATOM: u8 = 3;

impl Predicate {
    /// A predicate that is always true.
    #[must_use]
    pub const fn always() -> Self {
        Self::Literal(true)
    }

    /// A predicate that is always false.
    #[must_use]
    pub const fn never() -> Self {
        Self::Literal(false)
    }

    /// `self AND other`.
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// `self OR other`.
    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub(crate) fn precedence(&self) -> u8 {
        match self {
            Self::Or(..) => PREC_OR,
            Self::And(..) => PREC_AND,
            _ => PREC_ATOM,
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

/// A property of the queried entity.
pub fn prop(name: impl Into<String>) -> PropertyRef {
    PropertyRef {
        owner: None,
        name: name.into(),
    }
}

impl PropertyRef {
    /// A property of a joined entity (entity or navigation name).
    pub fn of(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            name: name.into(),
        }
    }

    /// Compares with a constant.
    pub fn compare(self, op: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::Compare {
            op,
            left: Operand::Property(self),
            right: Operand::Constant(value.into()),
        }
    }

    /// `self = value`
    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value.into())
    }

    /// `self <> value`
    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ne, value.into())
    }

    /// `self < value`
    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value.into())
    }

    /// `self <= value`
    pub fn le(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Le, value.into())
    }

    /// `self > value`
    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value.into())
    }

    /// `self >= value`
    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ge, value.into())
    }

    /// `self IS NULL`
    pub fn is_null(self) -> Predicate {
        self.compare(CompareOp::Eq, Value::Null)
    }

    /// `self IS NOT NULL`
    pub fn is_not_null(self) -> Predicate {
        self.compare(CompareOp::Ne, Value::Null)
    }

    /// Compares two properties.
    pub fn compare_to(self, op: CompareOp, other: PropertyRef) -> Predicate {
        Predicate::Compare {
            op,
            left: Operand::Property(self),
            right: Operand::Property(other),
        }
    }

    fn method(self, kind: MethodKind, literal: impl Into<Value>) -> Predicate {
        Predicate::Method {
            kind,
            target: self,
            literal: literal.into(),
        }
    }

    /// `self LIKE 'value%'`
    pub fn starts_with(self, value: impl Into<Value>) -> Predicate {
        self.method(MethodKind::StartsWith, value)
    }

    /// `self LIKE '%value'`
    pub fn ends_with(self, value: impl Into<Value>) -> Predicate {
        self.method(MethodKind::EndsWith, value)
    }

    /// `self LIKE '%value%'`
    pub fn contains(self, value: impl Into<Value>) -> Predicate {
        self.method(MethodKind::Contains, value)
    }

    /// `self = value`, written as a method call.
    pub fn equals(self, value: impl Into<Value>) -> Predicate {
        self.method(MethodKind::Equals, value)
    }
}

impl From<&str> for PropertyRef {
    fn from(name: &str) -> Self {
        prop(name)
    }
}

impl From<String> for PropertyRef {
    fn from(name: String) -> Self {
        prop(name)
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{owner}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_expected_tree() {
        let pred = prop("Name").contains("an").and(prop("Id").gt(2));
        match pred {
            Predicate::And(left, right) => {
                assert!(matches!(*left, Predicate::Method { kind: MethodKind::Contains, .. }));
                assert!(matches!(*right, Predicate::Compare { op: CompareOp::Gt, .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn precedence_orders_or_below_and() {
        let or = prop("A").eq(1).or(prop("B").eq(2));
        let and = prop("A").eq(1).and(prop("B").eq(2));
        assert!(or.precedence() < and.precedence());
        assert!(and.precedence() < Predicate::always().precedence());
        assert!(matches!(!Predicate::always(), Predicate::Not(_)));
    }

    #[test]
    fn predicates_deserialize_from_json() {
        let json = r#"{"Compare":{"op":"Eq","left":{"Property":{"name":"Name"}},"right":{"Constant":"Ann"}}}"#;
        let pred: Predicate = serde_json::from_str(json).unwrap();
        assert_eq!(pred, prop("Name").eq("Ann"));
    }
}
