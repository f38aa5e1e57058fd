//! Announces which dashboard tab the local user is viewing.
//!
//! The announcer only publishes. Each subscriber keeps its own roster by
//! folding the events into a
//! [`TabViewerRoster`](planboard_core::viewers::TabViewerRoster).

use std::sync::Arc;

use planboard_core::collaboration::{ActivityEvent, ActivityKind};
use planboard_core::identity::Participant;

use crate::bus::Channel;

pub struct ViewerPresence {
    channel: Arc<dyn Channel>,
}

impl ViewerPresence {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Publish `TabViewStart` for `user` on `tab`.
    pub fn announce(&self, tab: &str, user: &Participant) {
        tracing::debug!(tab, user_id = %user.user_id, "Tab view start");
        self.channel.publish(ActivityEvent::new(
            ActivityKind::TabViewStart { tab: tab.to_string() },
            user,
        ));
    }

    /// Publish `TabViewEnd` for `user` on `tab`.
    pub fn withdraw(&self, tab: &str, user: &Participant) {
        tracing::debug!(tab, user_id = %user.user_id, "Tab view end");
        self.channel.publish(ActivityEvent::new(
            ActivityKind::TabViewEnd { tab: tab.to_string() },
            user,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LoopbackChannel;
    use planboard_core::viewers::TabViewerRoster;

    #[tokio::test]
    async fn roster_follows_announce_and_withdraw() {
        let channel = Arc::new(LoopbackChannel::immediate());
        let mut sub = channel.subscribe();
        let presence = ViewerPresence::new(channel.clone());

        let me = Participant::new("me", "Me");
        let you = Participant::new("you", "You");
        presence.announce("schedule", &me);
        presence.announce("schedule", &you);
        presence.withdraw("schedule", &me);

        let mut roster = TabViewerRoster::new();
        for _ in 0..3 {
            let event = sub.recv().await.expect("event delivered");
            roster.apply(&event);
        }

        let viewers = roster.viewers("schedule");
        assert_eq!(viewers.len(), 1);
        assert_eq!(viewers[0].user_id, "you");
    }
}
