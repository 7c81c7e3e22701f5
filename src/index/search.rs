//! Index matching
//!
//! Matching is case-insensitive. Within one field a record matches if any
//! query value matches; across fields the matches are intersected.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::IndexData;
use crate::errors::{DbError, DbResult};
use crate::id::RecordId;

/// How an indexed value is compared to a query value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Equals => "equals",
            SearchMode::Contains => "contains",
            SearchMode::StartsWith => "starts_with",
            SearchMode::EndsWith => "ends_with",
        }
    }

    /// Compare two strings, ignoring case
    pub fn matches(&self, indexed: &str, query: &str) -> bool {
        let indexed = indexed.to_lowercase();
        let query = query.to_lowercase();
        match self {
            SearchMode::Equals => indexed == query,
            SearchMode::Contains => indexed.contains(&query),
            SearchMode::StartsWith => indexed.starts_with(&query),
            SearchMode::EndsWith => indexed.ends_with(&query),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equals" => Ok(SearchMode::Equals),
            "contains" => Ok(SearchMode::Contains),
            "starts_with" | "startswith" => Ok(SearchMode::StartsWith),
            "ends_with" | "endswith" => Ok(SearchMode::EndsWith),
            other => Err(DbError::Config(format!("unknown search mode: {}", other))),
        }
    }
}

/// Text form of an indexed value. Strings are compared without quotes.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Ids of one field index matching any of `values`
pub fn match_field(index: &IndexData, values: &[String], mode: SearchMode) -> BTreeSet<String> {
    index
        .iter()
        .filter(|(_, indexed)| {
            let text = value_text(indexed);
            values.iter().any(|query| mode.matches(&text, query))
        })
        .map(|(id, _)| id.clone())
        .collect()
}

/// Ids matching every field index
pub fn match_ids(indexes: &[IndexData], values: &[String], mode: SearchMode) -> BTreeSet<String> {
    let mut fields = indexes.iter();
    let Some(first) = fields.next() else {
        return BTreeSet::new();
    };

    let mut matched = match_field(first, values, mode);
    for index in fields {
        if matched.is_empty() {
            break;
        }
        let next = match_field(index, values, mode);
        matched.retain(|id| next.contains(id));
    }
    matched
}

/// Group ids by block so each block file is read once
pub fn group_by_block(ids: &BTreeSet<String>) -> DbResult<BTreeMap<String, Vec<String>>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for id in ids {
        let parsed = RecordId::parse(id)?;
        groups.entry(parsed.block).or_default().push(id.clone());
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index(pairs: &[(&str, Value)]) -> IndexData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_equals_ignores_case() {
        let types = index(&[("B/x/r1", json!("Room")), ("B/x/r2", json!("Hall"))]);
        let ids = match_ids(&[types], &strings(&["room"]), SearchMode::Equals);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["B/x/r1"]);
    }

    #[test]
    fn test_modes() {
        assert!(SearchMode::Contains.matches("Conference Hall", "ence h"));
        assert!(SearchMode::StartsWith.matches("Conference", "CONF"));
        assert!(SearchMode::EndsWith.matches("Conference", "RENCE"));
        assert!(!SearchMode::Equals.matches("Conference", "conf"));
    }

    #[test]
    fn test_any_value_within_field() {
        let types = index(&[
            ("B/x/r1", json!("Room")),
            ("B/x/r2", json!("Hall")),
            ("B/x/r3", json!("Desk")),
        ]);
        let ids = match_ids(&[types], &strings(&["room", "hall"]), SearchMode::Equals);
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains("B/x/r3"));
    }

    #[test]
    fn test_fields_are_intersected() {
        let name = index(&[("B/x/r1", json!("Blue")), ("B/x/r2", json!("Blue"))]);
        let colour = index(&[("B/x/r1", json!("Blue")), ("B/x/r2", json!("Red"))]);

        let ids = match_ids(&[name, colour], &strings(&["blue"]), SearchMode::Equals);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["B/x/r1"]);
    }

    #[test]
    fn test_id_missing_from_later_field_is_dropped() {
        let first = index(&[("B/x/r1", json!("a")), ("B/x/r2", json!("a"))]);
        let second = index(&[("B/x/r2", json!("a"))]);

        let ids = match_ids(&[first, second], &strings(&["a"]), SearchMode::Equals);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["B/x/r2"]);
    }

    #[test]
    fn test_non_string_values() {
        let guests = index(&[("B/x/r1", json!(4)), ("B/x/r2", json!(true))]);
        assert_eq!(match_ids(&[guests.clone()], &strings(&["4"]), SearchMode::Equals).len(), 1);
        assert_eq!(match_ids(&[guests], &strings(&["TRUE"]), SearchMode::Equals).len(), 1);
    }

    #[test]
    fn test_group_by_block() {
        let ids: BTreeSet<String> = ["B/202401/a", "B/202402/b", "B/202401/c"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let groups = group_by_block(&ids).unwrap();
        assert_eq!(groups["202401"], vec!["B/202401/a", "B/202401/c"]);
        assert_eq!(groups["202402"], vec!["B/202402/b"]);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("starts_with".parse::<SearchMode>().unwrap(), SearchMode::StartsWith);
        assert_eq!("EQUALS".parse::<SearchMode>().unwrap(), SearchMode::Equals);
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }
}
