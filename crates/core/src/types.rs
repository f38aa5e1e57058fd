/// Opaque user identifier supplied by the identity provider.
pub type UserId = String;

/// Opaque identifier of an editable dashboard field, e.g. `budget-venue-license`.
pub type FieldId = String;

/// Dashboard tab identifier, e.g. `schedule` or `media`.
pub type TabId = String;

/// Milliseconds since the Unix epoch (UTC).
pub type TimestampMillis = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> TimestampMillis {
    chrono::Utc::now().timestamp_millis()
}
