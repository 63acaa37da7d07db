//! Runtime values and their static types.

use std::fmt;

/// Static type of an expression, computed at compile time.
///
/// `Any` is produced by builtins whose result type depends on runtime
/// values (`and`, `or`); it is accepted everywhere at compile time and
/// checked again when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ty {
    Str,
    Int,
    Bool,
    List,
    Any,
}

impl Ty {
    /// Whether a value of type `arg` may be passed where `self` is expected.
    pub(crate) fn accepts(self, arg: Ty) -> bool {
        self == arg || self == Ty::Any || arg == Ty::Any
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Ty::Str => "string",
            Ty::Int => "int",
            Ty::Bool => "bool",
            Ty::List => "[]string",
            Ty::Any => "any",
        }
    }
}

/// A value produced while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl Value {
    pub(crate) fn ty(&self) -> Ty {
        match self {
            Value::Str(_) => Ty::Str,
            Value::Int(_) => Ty::Int,
            Value::Bool(_) => Ty::Bool,
            Value::List(_) => Ty::List,
        }
    }

    /// Template truthiness: zero values are false.
    pub(crate) fn is_truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
        }
    }

    pub(crate) fn as_str(&self) -> Result<&str, String> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(Ty::Str, other)),
        }
    }

    pub(crate) fn as_int(&self) -> Result<i64, String> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(mismatch(Ty::Int, other)),
        }
    }

    pub(crate) fn as_list(&self) -> Result<&[String], String> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(mismatch(Ty::List, other)),
        }
    }
}

fn mismatch(expected: Ty, got: &Value) -> String {
    format!("expected {}, got {}", expected.name(), got.ty().name())
}

/// Values print the way Go's `fmt` prints the corresponding Go values.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => write!(f, "[{}]", items.join(" ")),
        }
    }
}
