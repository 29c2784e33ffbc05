//! Channel broadcast engine.
//!
//! A broadcast takes a snapshot of the channel's members from the registry,
//! then writes to each member's transport after the actor has moved on to
//! other commands. Writes to different recipients run concurrently; a failed
//! or timed-out write is logged and counted but never stops delivery to the
//! remaining members.
//!
//! Ordering: the caller awaits the whole fan-out, so consecutive broadcasts
//! from one handler reach each recipient in order. Broadcasts from different
//! handlers may interleave across recipients.

use futures_util::future::join_all;
use tracing::{debug, warn};

use chanrelay_core::{ChannelName, SlotId};
use chanrelay_protocol::Notice;

use crate::registry::{Recipient, RegistryHandle};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients the notice was written to
    pub delivered: usize,
    /// Recipients whose write failed or timed out
    pub failed: usize,
}

/// Fans notices out to channel members.
#[derive(Clone)]
pub struct Broadcaster {
    registry: RegistryHandle,
}

impl Broadcaster {
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// Sends `notice` to every session in `channel` except `exclude`.
    ///
    /// `None` means "no channel": nothing is delivered and nothing fails.
    pub async fn broadcast(
        &self,
        notice: &Notice,
        channel: Option<&ChannelName>,
        exclude: SlotId,
    ) -> BroadcastReport {
        let Some(channel) = channel else {
            return BroadcastReport::default();
        };

        let recipients: Vec<Recipient> = self
            .registry
            .channel_members(channel)
            .await
            .into_iter()
            .filter(|recipient| recipient.slot != exclude)
            .collect();

        if recipients.is_empty() {
            return BroadcastReport::default();
        }

        let line = notice.render();
        let sends = recipients.iter().map(|recipient| {
            let line = line.as_str();
            async move { (recipient, recipient.writer.send_text(line).await) }
        });

        let mut report = BroadcastReport::default();
        for (recipient, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        channel = %channel,
                        slot = %recipient.slot,
                        username = %recipient.username,
                        error = %e,
                        "Failed to deliver to channel member"
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            channel = %channel,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast complete"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chanrelay_core::Username;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};

    use crate::registry::spawn_registry;
    use crate::transport::SessionWriter;

    const TIMEOUT: Duration = Duration::from_millis(100);

    async fn join(
        registry: &RegistryHandle,
        name: &str,
        channel: Option<&str>,
    ) -> (SlotId, BufReader<DuplexStream>) {
        let (local, remote) = tokio::io::duplex(1024);
        let slot = registry
            .register(
                Username::parse(name).unwrap(),
                SessionWriter::new(local, TIMEOUT),
            )
            .await
            .unwrap();
        registry
            .set_channel(slot, channel.map(|c| ChannelName::parse(c).unwrap()))
            .await
            .unwrap();
        (slot, BufReader::new(remote))
    }

    async fn read_line(reader: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(1), reader.read_line(&mut line))
            .await
            .expect("line should arrive")
            .unwrap();
        line
    }

    async fn assert_silent(reader: &mut BufReader<DuplexStream>) {
        let mut line = String::new();
        let result =
            tokio::time::timeout(Duration::from_millis(50), reader.read_line(&mut line)).await;
        assert!(result.is_err(), "unexpected line: {line:?}");
    }

    fn chat(name: &str, text: &str) -> Notice {
        Notice::Chat {
            username: Username::parse(name).unwrap(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_channel_except_sender() {
        let registry = spawn_registry(8);
        let broadcaster = Broadcaster::new(registry.clone());

        let (alice, mut alice_rx) = join(&registry, "alice", Some("#general")).await;
        let (_, mut bob_rx) = join(&registry, "bob", Some("#general")).await;
        let (_, mut carol_rx) = join(&registry, "carol", Some("#other")).await;
        let (_, mut dave_rx) = join(&registry, "dave", None).await;

        let general = ChannelName::parse("#general").unwrap();
        let report = broadcaster
            .broadcast(&chat("alice", "hi"), Some(&general), alice)
            .await;

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 0 });
        assert_eq!(read_line(&mut bob_rx).await, "alice: hi\n");
        assert_silent(&mut alice_rx).await;
        assert_silent(&mut carol_rx).await;
        assert_silent(&mut dave_rx).await;
    }

    #[tokio::test]
    async fn test_no_channel_delivers_nothing() {
        let registry = spawn_registry(4);
        let broadcaster = Broadcaster::new(registry.clone());
        let (alice, _alice_rx) = join(&registry, "alice", None).await;
        let (_, mut bob_rx) = join(&registry, "bob", None).await;

        let report = broadcaster.broadcast(&chat("alice", "hi"), None, alice).await;

        assert_eq!(report, BroadcastReport::default());
        assert_silent(&mut bob_rx).await;
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_block_others() {
        let registry = spawn_registry(4);
        let broadcaster = Broadcaster::new(registry.clone());

        let (alice, _alice_rx) = join(&registry, "alice", Some("#general")).await;
        let (_, bob_rx) = join(&registry, "bob", Some("#general")).await;
        let (_, mut carol_rx) = join(&registry, "carol", Some("#general")).await;
        drop(bob_rx);

        let general = ChannelName::parse("#general").unwrap();
        let report = broadcaster
            .broadcast(&chat("alice", "still here"), Some(&general), alice)
            .await;

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 1 });
        assert_eq!(read_line(&mut carol_rx).await, "alice: still here\n");
    }

    #[tokio::test]
    async fn test_per_recipient_order_is_preserved() {
        let registry = spawn_registry(4);
        let broadcaster = Broadcaster::new(registry.clone());
        let (alice, _alice_rx) = join(&registry, "alice", Some("#general")).await;
        let (_, mut bob_rx) = join(&registry, "bob", Some("#general")).await;

        let general = ChannelName::parse("#general").unwrap();
        for i in 0..20 {
            broadcaster
                .broadcast(&chat("alice", &i.to_string()), Some(&general), alice)
                .await;
        }

        for i in 0..20 {
            assert_eq!(read_line(&mut bob_rx).await, format!("alice: {i}\n"));
        }
    }
}
