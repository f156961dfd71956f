//! Runtime value type for data code.
//!
//! Every expression evaluates to exactly one [`Value`].  Scalars flow into
//! `Set`, assertions, and formatting; [`Value::Report`] carries a nested run's
//! results back up to the Runner untouched; [`Value::Pass`] marks a step that
//! ran to completion with nothing further to report.

use std::fmt;

use serde_json::{Map, Value as Json};

use super::report::ReportTree;

/// The textual form of the pass sentinel as it appears in reports.
pub const PASS_LABEL: &str = "[Pass()]";

/// A data code runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    /// A decoded JSON object (member order is irrelevant).
    Json(Map<String, Json>),
    /// A failure stored as data, e.g. one slot of a `ParallelPost`.
    Error(String),
    Report(ReportTree),
    Pass,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Json(map) => write!(f, "{}", Json::Object(map.clone())),
            Value::Error(msg) => write!(f, "{msg}"),
            Value::Report(tree) => write!(f, "{}", tree.label),
            Value::Pass => f.write_str(PASS_LABEL),
        }
    }
}

impl Value {
    /// Name of the variant, used in type-mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Bool(_) => "boolean",
            Value::Json(_) => "json",
            Value::Error(_) => "error",
            Value::Report(_) => "report",
            Value::Pass => "pass",
        }
    }

    /// `true` for the plain values `Set` can bind and `PrintF` can render.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Str(_) | Value::Int(_) | Value::Bool(_))
    }

    /// Integer view: integers as-is, strings only when they parse exactly.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean view: booleans as-is, strings only for `true`/`false`/`1`/`0`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Str(s) => match s.trim() {
                "true" | "TRUE" | "True" | "1" => Some(true),
                "false" | "FALSE" | "False" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert a decoded JSON member into a runtime value.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::String(s) => Value::Str(s.clone()),
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Str(n.to_string()),
            },
            Json::Object(map) => Value::Json(map.clone()),
            other => Value::Str(other.to_string()),
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    fn int_operands(&self, rhs: &Value, op: &str) -> Result<(i64, i64), String> {
        match (self.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(format!(
                "invalid operands for {op}: {} and {}",
                self.type_name(),
                rhs.type_name()
            )),
        }
    }

    /// `+` adds integers and concatenates anything else that is a scalar.
    pub fn arith_add(&self, rhs: &Value) -> Result<Value, String> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (Value::Str(_), _) | (_, Value::Str(_)) if self.is_scalar() && rhs.is_scalar() => {
                Ok(Value::Str(format!("{self}{rhs}")))
            }
            _ => self.int_operands(rhs, "+").map(|(a, b)| Value::Int(a.wrapping_add(b))),
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = self.int_operands(rhs, "-")?;
        Ok(Value::Int(a.wrapping_sub(b)))
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = self.int_operands(rhs, "*")?;
        Ok(Value::Int(a.wrapping_mul(b)))
    }

    pub fn arith_div(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = self.int_operands(rhs, "/")?;
        if b == 0 {
            return Err("division by zero".into());
        }
        Ok(Value::Int(a.wrapping_div(b)))
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = self.int_operands(rhs, "%")?;
        if b == 0 {
            return Err("modulo by zero".into());
        }
        Ok(Value::Int(a.wrapping_rem(b)))
    }

    pub fn arith_neg(&self) -> Result<Value, String> {
        self.as_int()
            .map(|n| Value::Int(n.wrapping_neg()))
            .ok_or_else(|| format!("cannot negate {}", self.type_name()))
    }

    /// Relational comparison: numeric when both sides are integers,
    /// textual otherwise.
    pub fn cmp_value(&self, rhs: &Value) -> std::cmp::Ordering {
        match (self.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.to_string().cmp(&rhs.to_string()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
