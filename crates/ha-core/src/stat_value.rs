//! Values produced by stats and used as rule conditions

use serde::{Deserialize, Serialize};
use std::fmt;

/// The current sample of a stat
///
/// Only equality is defined between values. Different variants never compare
/// equal, so `Int(905)` does not match `Str("905")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl StatValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StatValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Bool(b) => write!(f, "{}", b),
            StatValue::Int(n) => write!(f, "{}", n),
            StatValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for StatValue {
    fn from(n: i64) -> Self {
        StatValue::Int(n)
    }
}

impl From<i32> for StatValue {
    fn from(n: i32) -> Self {
        StatValue::Int(n.into())
    }
}

impl From<u32> for StatValue {
    fn from(n: u32) -> Self {
        StatValue::Int(n.into())
    }
}

impl From<bool> for StatValue {
    fn from(b: bool) -> Self {
        StatValue::Bool(b)
    }
}

impl From<&str> for StatValue {
    fn from(s: &str) -> Self {
        StatValue::Str(s.to_string())
    }
}

impl From<String> for StatValue {
    fn from(s: String) -> Self {
        StatValue::Str(s)
    }
}
