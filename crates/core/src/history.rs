//! Edit-history entries: construction, value coercion and the durable row format.
//!
//! Entries are append-only. They are created once per successful field save,
//! never mutated, and only ever removed in bulk.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::collaboration::infer_section;
use crate::error::CoreError;
use crate::identity::SessionUser;
use crate::types::{FieldId, TimestampMillis, UserId};

/// Length of the random suffix of generated entry ids.
const ID_SUFFIX_LEN: usize = 7;

/// One recorded field change.
///
/// Serialized in camelCase; this is also the format of the local fallback
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditHistoryEntry {
    pub id: String,
    pub timestamp: TimestampMillis,
    pub user_id: UserId,
    pub user_name: String,
    pub user_role: String,
    pub field_id: FieldId,
    pub section: String,
    pub previous_value: String,
    pub new_value: String,
}

/// A field save as reported by the UI, before attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEdit {
    pub field_id: FieldId,
    /// Explicit section; inferred from the field id when `None`.
    pub section: Option<String>,
    pub previous_value: serde_json::Value,
    pub new_value: serde_json::Value,
}

impl FieldEdit {
    pub fn new(
        field_id: impl Into<FieldId>,
        previous_value: serde_json::Value,
        new_value: serde_json::Value,
    ) -> Self {
        Self {
            field_id: field_id.into(),
            section: None,
            previous_value,
            new_value,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

/// Collapse an arbitrary value into its stored string form.
///
/// `null` becomes the empty string, objects and arrays their compact JSON
/// text, strings pass through, numbers and booleans their display form.
pub fn coerce_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Collision-resistant client-side id: `edit-<millis>-<7 base36 chars>`.
pub fn generate_entry_id(now: TimestampMillis) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .filter_map(|_| std::char::from_digit(rng.random_range(0..36), 36))
        .collect();
    format!("edit-{now}-{suffix}")
}

impl EditHistoryEntry {
    /// Attribute `edit` to `user` at time `now`.
    pub fn record(edit: FieldEdit, user: &SessionUser, now: TimestampMillis) -> Self {
        let section = edit
            .section
            .unwrap_or_else(|| infer_section(&edit.field_id).to_string());
        Self {
            id: generate_entry_id(now),
            timestamp: now,
            user_id: user.user_id(),
            user_name: user.display_name(),
            user_role: user.role_label(),
            previous_value: coerce_value(&edit.previous_value),
            new_value: coerce_value(&edit.new_value),
            field_id: edit.field_id,
            section,
        }
    }

    /// The row appended to the durable sheet. Timestamps are written as
    /// RFC 3339 so they read naturally in the spreadsheet.
    pub fn to_row(&self) -> serde_json::Value {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| self.timestamp.to_string());

        serde_json::json!({
            "id": self.id,
            "timestamp": timestamp,
            "userId": self.user_id,
            "userName": self.user_name,
            "userRole": self.user_role,
            "fieldId": self.field_id,
            "section": self.section,
            "previousValue": self.previous_value,
            "newValue": self.new_value,
        })
    }

    /// Decode a row fetched from the durable sheet.
    ///
    /// Spreadsheet cells come back loosely typed, so the timestamp may be
    /// epoch millis (number or numeric string) or an RFC 3339 string, and
    /// value cells may be numbers. `id` and `timestamp` are required.
    pub fn from_row(row: &serde_json::Value) -> Result<Self, CoreError> {
        let object = row
            .as_object()
            .ok_or_else(|| CoreError::Malformed("history row is not an object".into()))?;

        let text = |key: &str| object.get(key).map(coerce_value).unwrap_or_default();

        let id = text("id");
        if id.is_empty() {
            return Err(CoreError::Malformed("history row has no id".into()));
        }

        let timestamp = object
            .get("timestamp")
            .and_then(parse_timestamp)
            .ok_or_else(|| CoreError::Malformed(format!("history row {id} has no valid timestamp")))?;

        Ok(Self {
            id,
            timestamp,
            user_id: text("userId"),
            user_name: text("userName"),
            user_role: text("userRole"),
            field_id: text("fieldId"),
            section: text("section"),
            previous_value: text("previousValue"),
            new_value: text("newValue"),
        })
    }
}

fn parse_timestamp(value: &serde_json::Value) -> Option<TimestampMillis> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| {
            DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.timestamp_millis())
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Read-model helpers
// ---------------------------------------------------------------------------

/// Order entries newest first.
pub fn sort_newest_first(entries: &mut [EditHistoryEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Entries matching the optional user and section filters.
pub fn filter_entries<'a>(
    entries: &'a [EditHistoryEntry],
    user_id: Option<&str>,
    section: Option<&str>,
) -> Vec<&'a EditHistoryEntry> {
    entries
        .iter()
        .filter(|e| user_id.map_or(true, |u| e.user_id == u))
        .filter(|e| section.map_or(true, |s| e.section == s))
        .collect()
}

/// Distinct `(user_id, user_name)` pairs in first-seen order.
pub fn distinct_users(entries: &[EditHistoryEntry]) -> Vec<(UserId, String)> {
    let mut seen = BTreeSet::new();
    entries
        .iter()
        .filter(|e| seen.insert(e.user_id.clone()))
        .map(|e| (e.user_id.clone(), e.user_name.clone()))
        .collect()
}

/// Distinct non-empty sections, sorted.
pub fn distinct_sections(entries: &[EditHistoryEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| !e.section.is_empty())
        .map(|e| e.section.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn editor() -> SessionUser {
        SessionUser {
            id: Some("u-1".into()),
            name: Some("Ada".into()),
            role: Some("editor".into()),
            ..Default::default()
        }
    }

    fn entry(id: &str, ts: i64, user: &str, section: &str) -> EditHistoryEntry {
        EditHistoryEntry {
            id: id.into(),
            timestamp: ts,
            user_id: user.into(),
            user_name: user.to_uppercase(),
            user_role: "editor".into(),
            field_id: "budget-1".into(),
            section: section.into(),
            previous_value: String::new(),
            new_value: "1".into(),
        }
    }

    // -----------------------------------------------------------------------
    // Coercion
    // -----------------------------------------------------------------------

    #[test]
    fn coerce_object_to_json_text() {
        assert_eq!(coerce_value(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn coerce_null_to_empty() {
        assert_eq!(coerce_value(&serde_json::Value::Null), "");
    }

    #[test]
    fn coerce_scalars() {
        assert_eq!(coerce_value(&json!("plain")), "plain");
        assert_eq!(coerce_value(&json!(42)), "42");
        assert_eq!(coerce_value(&json!(true)), "true");
        assert_eq!(coerce_value(&json!([1, 2])), "[1,2]");
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn record_attributes_and_coerces() {
        let edit = FieldEdit::new("budget-venue", json!({"a": 1}), serde_json::Value::Null);
        let e = EditHistoryEntry::record(edit, &editor(), 1_700_000_000_000);

        assert!(e.id.starts_with("edit-1700000000000-"));
        assert_eq!(e.user_id, "u-1");
        assert_eq!(e.user_name, "Ada");
        assert_eq!(e.user_role, "editor");
        assert_eq!(e.section, "Budget");
        assert_eq!(e.previous_value, r#"{"a":1}"#);
        assert_eq!(e.new_value, "");
    }

    #[test]
    fn record_keeps_provider_role_text() {
        let mut user = editor();
        user.role = Some("superuser".into());
        let e = EditHistoryEntry::record(FieldEdit::new("budget-1", json!(1), json!(2)), &user, 1);
        assert_eq!(e.user_role, "superuser");

        user.role = None;
        let e = EditHistoryEntry::record(FieldEdit::new("budget-1", json!(1), json!(2)), &user, 1);
        assert_eq!(e.user_role, "user");
    }

    #[test]
    fn explicit_section_wins_over_inference() {
        let edit = FieldEdit::new("budget-venue", json!(1), json!(2)).with_section("Overview");
        let e = EditHistoryEntry::record(edit, &editor(), 1);
        assert_eq!(e.section, "Overview");
    }

    #[test]
    fn generated_ids_differ() {
        let a = generate_entry_id(5);
        let b = generate_entry_id(5);
        assert_eq!(a.len(), "edit-5-".len() + ID_SUFFIX_LEN);
        assert_ne!(a, b);
    }

    // -----------------------------------------------------------------------
    // Durable rows
    // -----------------------------------------------------------------------

    #[test]
    fn to_row_writes_rfc3339_timestamp() {
        let row = entry("edit-1", 0, "u", "Budget").to_row();
        assert_eq!(row["timestamp"], "1970-01-01T00:00:00.000Z");
        assert_eq!(row["fieldId"], "budget-1");
    }

    #[test]
    fn from_row_accepts_rfc3339_and_millis() {
        let original = entry("edit-1", 1_700_000_000_123, "u", "Budget");
        assert_eq!(EditHistoryEntry::from_row(&original.to_row()).unwrap(), original);

        let row = json!({"id": "edit-2", "timestamp": 300, "newValue": 7});
        let decoded = EditHistoryEntry::from_row(&row).unwrap();
        assert_eq!(decoded.timestamp, 300);
        assert_eq!(decoded.new_value, "7");
        assert_eq!(decoded.previous_value, "");

        let row = json!({"id": "edit-3", "timestamp": "200"});
        assert_eq!(EditHistoryEntry::from_row(&row).unwrap().timestamp, 200);
    }

    #[test]
    fn from_row_rejects_missing_id_or_timestamp() {
        assert_matches!(
            EditHistoryEntry::from_row(&json!({"timestamp": 1})),
            Err(CoreError::Malformed(_))
        );
        assert_matches!(
            EditHistoryEntry::from_row(&json!({"id": "x", "timestamp": "yesterday"})),
            Err(CoreError::Malformed(_))
        );
        assert_matches!(EditHistoryEntry::from_row(&json!([1])), Err(CoreError::Malformed(_)));
    }

    // -----------------------------------------------------------------------
    // Read models
    // -----------------------------------------------------------------------

    #[test]
    fn sort_orders_newest_first() {
        let mut entries = vec![
            entry("a", 100, "u", "Budget"),
            entry("b", 300, "u", "Budget"),
            entry("c", 200, "u", "Budget"),
        ];
        sort_newest_first(&mut entries);
        let ts: Vec<_> = entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![300, 200, 100]);
    }

    #[test]
    fn filter_by_user_and_section() {
        let entries = vec![
            entry("a", 1, "u1", "Budget"),
            entry("b", 2, "u2", "Budget"),
            entry("c", 3, "u1", "Timeline"),
        ];
        assert_eq!(filter_entries(&entries, Some("u1"), None).len(), 2);
        assert_eq!(filter_entries(&entries, None, Some("Budget")).len(), 2);
        assert_eq!(filter_entries(&entries, Some("u1"), Some("Timeline"))[0].id, "c");
        assert_eq!(filter_entries(&entries, None, None).len(), 3);
    }

    #[test]
    fn distinct_users_and_sections() {
        let entries = vec![
            entry("a", 1, "u2", "Timeline"),
            entry("b", 2, "u1", "Budget"),
            entry("c", 3, "u2", ""),
        ];
        let users = distinct_users(&entries);
        assert_eq!(users, vec![("u2".into(), "U2".into()), ("u1".into(), "U1".into())]);
        assert_eq!(distinct_sections(&entries), vec!["Budget", "Timeline"]);
    }
}
