// src/api/hub.rs
// Per-session broadcast channels for WebSocket push delivery

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;
use uuid::Uuid;

use super::ws::ServerEvent;

/// Buffered events per channel before slow receivers start lagging
const CHANNEL_CAPACITY: usize = 64;

/// An event published to a session channel.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    /// Connection that must not receive this event (the sender, for typing
    /// indicators). `None` delivers to every member.
    pub skip: Option<Uuid>,
    pub event: ServerEvent,
}

impl ChannelMessage {
    pub fn is_for(&self, connection_id: Uuid) -> bool {
        self.skip != Some(connection_id)
    }
}

/// Channels keyed by session id. Joining is subscribing; a channel lives as
/// long as it has members.
#[derive(Default)]
pub struct ChannelHub {
    channels: Mutex<HashMap<String, broadcast::Sender<ChannelMessage>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<ChannelMessage>>> {
        // The map stays consistent even if a holder panicked
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Become a member of `session_id`. Dropping the membership leaves the
    /// channel, and the last member out removes it.
    pub fn join(self: &Arc<Self>, session_id: &str) -> Membership {
        let receiver = self
            .channels()
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        Membership {
            hub: Arc::clone(self),
            session_id: session_id.to_string(),
            receiver: Some(receiver),
        }
    }

    /// Publish to every member of `session_id` except `skip`. Returns the
    /// number of members reached.
    pub fn publish(&self, session_id: &str, skip: Option<Uuid>, event: ServerEvent) -> usize {
        let mut channels = self.channels();
        let Some(sender) = channels.get(session_id) else {
            return 0;
        };

        match sender.send(ChannelMessage { skip, event }) {
            Ok(receivers) => receivers,
            Err(_) => {
                channels.remove(session_id);
                0
            }
        }
    }

    pub fn member_count(&self, session_id: &str) -> usize {
        self.channels()
            .get(session_id)
            .map_or(0, |sender| sender.receiver_count())
    }

    /// Number of sessions with a live channel.
    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }

    fn leave(&self, session_id: &str) {
        let mut channels = self.channels();
        if channels
            .get(session_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(session_id);
            debug!(session_id = %session_id, "Dropped channel without members");
        }
    }
}

/// Membership of one session channel.
pub struct Membership {
    hub: Arc<ChannelHub>,
    session_id: String,
    receiver: Option<broadcast::Receiver<ChannelMessage>>,
}

impl Membership {
    pub async fn recv(&mut self) -> Result<ChannelMessage, RecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        // Release the receiver first so the count seen by `leave` excludes it
        self.receiver.take();
        self.hub.leave(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_members() {
        let hub = Arc::new(ChannelHub::new());
        let mut first = hub.join("s1");
        let mut second = hub.join("s1");

        let reached = hub.publish("s1", None, ServerEvent::Typing(true));
        assert_eq!(reached, 2);
        assert!(matches!(first.recv().await.unwrap().event, ServerEvent::Typing(true)));
        assert!(matches!(second.recv().await.unwrap().event, ServerEvent::Typing(true)));
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let hub = Arc::new(ChannelHub::new());
        let mut other = hub.join("s2");
        let _member = hub.join("s1");

        hub.publish("s1", None, ServerEvent::Typing(false));
        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), other.recv()).await;
        assert!(pending.is_err());
    }

    #[test]
    fn test_publish_without_members() {
        let hub = Arc::new(ChannelHub::new());
        assert_eq!(hub.publish("nobody", None, ServerEvent::Typing(true)), 0);

        drop(hub.join("gone"));
        assert_eq!(hub.publish("gone", None, ServerEvent::Typing(true)), 0);
        assert_eq!(hub.member_count("gone"), 0);
    }

    #[test]
    fn test_last_member_out_removes_channel() {
        let hub = Arc::new(ChannelHub::new());
        let first = hub.join("s1");
        let second = hub.join("s1");
        assert_eq!(hub.member_count("s1"), 2);

        drop(first);
        assert_eq!(hub.channel_count(), 1);
        assert_eq!(hub.member_count("s1"), 1);

        drop(second);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_departed_sessions_leave_no_channels() {
        let hub = Arc::new(ChannelHub::new());
        for i in 0..1000 {
            drop(hub.join(&format!("session-{i}")));
        }
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_skip_filters_origin() {
        let origin = Uuid::new_v4();
        let message = ChannelMessage {
            skip: Some(origin),
            event: ServerEvent::Typing(true),
        };
        assert!(!message.is_for(origin));
        assert!(message.is_for(Uuid::new_v4()));
    }
}
