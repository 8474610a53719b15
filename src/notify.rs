//! Process-wide notifications for the surrounding application.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// Events a front end may react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioEvent {
    /// The service rejected the configured API key.
    CredentialsRejected {
        /// Upstream message that triggered the event.
        message: String,
    },
}

/// Fire-and-forget broadcaster. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<StudioEvent>,
}

impl Notifier {
    /// Creates a notifier with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }

    /// Emits an event. Having no subscribers is not an error.
    pub fn notify(&self, event: StudioEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(delivered, "studio event emitted");
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_subscribers() {
        Notifier::new().notify(StudioEvent::CredentialsRejected {
            message: "bad key".into(),
        });
    }

    #[test]
    fn test_clones_share_channel() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        notifier.clone().notify(StudioEvent::CredentialsRejected {
            message: "403".into(),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            StudioEvent::CredentialsRejected {
                message: "403".into()
            }
        );
    }
}
