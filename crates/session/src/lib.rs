//! Client-side collaboration session for the planning dashboard.
//!
//! - [`config`]: [`SessionConfig`] loaded from the environment.
//! - [`ledger`]: the [`EditHistoryLedger`] (durable append, local mirror,
//!   polling refresh).
//! - [`session`]: [`CollabSession`], the composition root tying the channel,
//!   locks, feed, roster and ledger together.

pub mod config;
pub mod ledger;
pub mod session;

pub use config::{ChannelKind, ConfigError, SessionConfig};
pub use ledger::EditHistoryLedger;
pub use session::{build_channel, CollabSession, SessionParts, Transport};
