//! Collaboration constants, section inference and the activity-event protocol.
//!
//! This module lives in `core` so that the loopback channel, the socket
//! transport, the relay and the session all decode and encode exactly the
//! same message shapes.

use serde::{Deserialize, Serialize};

use crate::identity::Participant;
use crate::types::{now_millis, FieldId, TabId, TimestampMillis, UserId};

// ---------------------------------------------------------------------------
// Timing and sizing constants
// ---------------------------------------------------------------------------

/// Number of entries retained by the activity feed.
pub const ACTIVITY_FEED_CAPACITY: usize = 10;

/// How long an update toast stays visible (in seconds).
pub const TOAST_DISPLAY_SECS: u64 = 5;

/// How often the edit-history ledger is reloaded from the durable store.
pub const HISTORY_POLL_INTERVAL_SECS: u64 = 10;

/// Interval between keep-alive pings on a socket transport (in seconds).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Artificial delivery delay of the loopback channel (in milliseconds).
pub const LOOPBACK_DELAY_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Dashboard sections an edit can be attributed to.
pub mod sections {
    pub const BUDGET: &str = "Budget";
    pub const TIMELINE: &str = "Timeline";
    pub const OVERVIEW: &str = "Overview";
    pub const BROADCAST: &str = "Broadcast";
    pub const MARKETING: &str = "Marketing";
    pub const GENERAL: &str = "General";
}

/// Infer the dashboard section from a field id's prefix.
///
/// Field ids are dash-separated with the section family first
/// (`budget-venue-license`, `metric-total-budget`). Unknown prefixes land in
/// [`sections::GENERAL`].
pub fn infer_section(field_id: &str) -> &'static str {
    match field_id.split('-').next().unwrap_or_default() {
        "budget" => sections::BUDGET,
        "timeline" => sections::TIMELINE,
        "metric" => sections::OVERVIEW,
        "broadcast" => sections::BROADCAST,
        "marketing" => sections::MARKETING,
        _ => sections::GENERAL,
    }
}

// ---------------------------------------------------------------------------
// Activity event protocol
// ---------------------------------------------------------------------------

/// The closed set of things that can happen on the collaboration channel.
///
/// Serialized with an internally-tagged `"type"` discriminator; each variant
/// carries only the fields relevant to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ActivityKind {
    #[serde(rename = "USER_CONNECTED")]
    UserConnected,

    #[serde(rename = "USER_DISCONNECTED")]
    UserDisconnected,

    /// A user opened a field for editing.
    #[serde(rename = "FIELD_EDIT_START")]
    FieldEditStart { field_id: FieldId },

    /// A user saved or cancelled an edit.
    #[serde(rename = "FIELD_EDIT_COMPLETE")]
    FieldEditComplete { field_id: FieldId },

    /// A field was saved with a new value.
    #[serde(rename = "FIELD_UPDATED")]
    FieldUpdated {
        field_id: FieldId,
        new_value: serde_json::Value,
        section: String,
    },

    #[serde(rename = "TAB_VIEW_START")]
    TabViewStart { tab: TabId },

    #[serde(rename = "TAB_VIEW_END")]
    TabViewEnd { tab: TabId },

    /// Transport keep-alive. Never surfaced to the feed.
    #[serde(rename = "ping")]
    Ping,
}

/// An activity notification plus the attributes common to every kind.
///
/// Author fields default to empty so that bare keep-alive frames such as
/// `{"type":"ping"}` still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    #[serde(flatten)]
    pub kind: ActivityKind,
    #[serde(default)]
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub color_tag: String,
    #[serde(default)]
    pub timestamp: TimestampMillis,
}

impl ActivityEvent {
    /// Create an event authored by `author`, stamped with the current time.
    pub fn new(kind: ActivityKind, author: &Participant) -> Self {
        Self {
            kind,
            user_id: author.user_id.clone(),
            user_name: author.display_name.clone(),
            color_tag: author.color_tag.clone(),
            timestamp: now_millis(),
        }
    }

    /// Build a `FieldUpdated` event with the section inferred from the id.
    pub fn field_updated(
        field_id: impl Into<FieldId>,
        new_value: serde_json::Value,
        author: &Participant,
    ) -> Self {
        let field_id = field_id.into();
        let section = infer_section(&field_id).to_string();
        Self::new(
            ActivityKind::FieldUpdated {
                field_id,
                new_value,
                section,
            },
            author,
        )
    }

    /// The author as a participant.
    pub fn author(&self) -> Participant {
        Participant {
            user_id: self.user_id.clone(),
            display_name: self.user_name.clone(),
            color_tag: self.color_tag.clone(),
        }
    }

    /// The field this event refers to, if any.
    pub fn field_id(&self) -> Option<&str> {
        match &self.kind {
            ActivityKind::FieldEditStart { field_id }
            | ActivityKind::FieldEditComplete { field_id }
            | ActivityKind::FieldUpdated { field_id, .. } => Some(field_id),
            _ => None,
        }
    }

    pub fn is_field_update(&self) -> bool {
        matches!(self.kind, ActivityKind::FieldUpdated { .. })
    }

    /// Wire name of the event kind, for logging.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ActivityKind::UserConnected => "USER_CONNECTED",
            ActivityKind::UserDisconnected => "USER_DISCONNECTED",
            ActivityKind::FieldEditStart { .. } => "FIELD_EDIT_START",
            ActivityKind::FieldEditComplete { .. } => "FIELD_EDIT_COMPLETE",
            ActivityKind::FieldUpdated { .. } => "FIELD_UPDATED",
            ActivityKind::TabViewStart { .. } => "TAB_VIEW_START",
            ActivityKind::TabViewEnd { .. } => "TAB_VIEW_END",
            ActivityKind::Ping => "ping",
        }
    }
}

/// Parse a text frame into a typed event.
///
/// Returns `Err` for malformed JSON or unknown `type` values. Callers
/// should log and drop such frames.
pub fn parse_message(text: &str) -> Result<ActivityEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Encode an event as a text frame.
pub fn encode_message(event: &ActivityEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
