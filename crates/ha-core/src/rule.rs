//! A single stat → action rule as written in the rules file

use crate::StatValue;
use serde::{Deserialize, Serialize};

/// Fire `action` on the owning entity when `stat_name` samples to `value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub stat_name: String,
    pub value: StatValue,
    pub action: String,
}

impl Rule {
    pub fn new(
        stat_name: impl Into<String>,
        value: impl Into<StatValue>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            stat_name: stat_name.into(),
            value: value.into(),
            action: action.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule() {
        let rule: Rule =
            serde_json::from_str(r#"{"stat_name": "time", "value": 1830, "action": "turn_on"}"#)
                .unwrap();
        assert_eq!(rule, Rule::new("time", 1830, "turn_on"));
    }

    #[test]
    fn test_missing_field() {
        let result = serde_json::from_str::<Rule>(r#"{"stat_name": "time", "value": 1830}"#);
        assert!(result.is_err());
    }
}
