//! Planboard collaboration channel.
//!
//! - [`Channel`]: the publish/subscribe capability every transport offers.
//! - [`LoopbackChannel`]: in-process fan-out with a simulated delivery delay,
//!   backed by `tokio::sync::broadcast`.
//! - [`ViewerPresence`]: announces and withdraws tab viewers on a channel.

pub mod bus;
pub mod presence;

pub use bus::{Channel, LoopbackChannel, Subscription};
pub use presence::ViewerPresence;
