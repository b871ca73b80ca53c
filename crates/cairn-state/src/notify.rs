//! Consensus-change subscriptions.
//!
//! Subscribers get a bounded channel. Notifications are pushed after state
//! mutation completes but before the engine's write lock is released, so
//! observers always see changes in a single total order. A subscriber that
//! stops draining loses its oldest pending changes rather than stalling the
//! write path.

use crate::diff::ConsensusChange;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

/// Pending notifications a subscriber may fall behind by before its oldest
/// are overwritten.
pub const SUBSCRIBER_QUEUE_DEPTH: usize = 32;

/// The set of live subscriber channels.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    /// Sender plus a registry-held receiver clone: the clone is what lets
    /// the notifier pop a lagging subscriber's oldest entry.
    channels: Vec<(Sender<ConsensusChange>, Receiver<ConsensusChange>)>,
    dropped_total: u64,
}

impl SubscriberRegistry {
    /// Open a new subscription.
    pub fn subscribe(&mut self) -> Receiver<ConsensusChange> {
        let (tx, rx) = bounded(SUBSCRIBER_QUEUE_DEPTH);
        self.channels.push((tx, rx.clone()));
        rx
    }

    /// Deliver one change to every subscriber, dropping the oldest queued
    /// change of any subscriber whose queue is full.
    pub fn notify(&mut self, change: &ConsensusChange) {
        let mut dropped = 0u64;
        for (tx, rx) in &self.channels {
            let mut pending = change.clone();
            loop {
                match tx.try_send(pending) {
                    Ok(()) => break,
                    Err(TrySendError::Full(back)) => {
                        let _ = rx.try_recv();
                        dropped += 1;
                        pending = back;
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
        }
        if dropped > 0 {
            self.dropped_total += dropped;
            warn!(
                dropped,
                total = self.dropped_total,
                "lagging subscribers lost their oldest consensus changes"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_types::{hash_bytes, Block};

    fn change(tag: u64) -> ConsensusChange {
        ConsensusChange {
            applied_blocks: vec![Block {
                nonce: tag,
                miner_address: hash_bytes(b"m"),
                ..Block::default()
            }],
            ..ConsensusChange::default()
        }
    }

    #[test]
    fn delivery_preserves_order() {
        let mut registry = SubscriberRegistry::default();
        let rx = registry.subscribe();
        registry.notify(&change(1));
        registry.notify(&change(2));
        assert_eq!(rx.recv().unwrap(), change(1));
        assert_eq!(rx.recv().unwrap(), change(2));
    }

    #[test]
    fn overflow_drops_oldest_not_newest() {
        let mut registry = SubscriberRegistry::default();
        let rx = registry.subscribe();
        for i in 0..(SUBSCRIBER_QUEUE_DEPTH as u64 + 3) {
            registry.notify(&change(i));
        }
        // The first messages were sacrificed; the latest survived.
        let first = rx.try_recv().unwrap();
        assert_eq!(first, change(3));
        let mut last = first;
        while let Ok(next) = rx.try_recv() {
            last = next;
        }
        assert_eq!(last, change(SUBSCRIBER_QUEUE_DEPTH as u64 + 2));
    }

    #[test]
    fn each_subscriber_has_its_own_queue() {
        let mut registry = SubscriberRegistry::default();
        let rx1 = registry.subscribe();
        let rx2 = registry.subscribe();
        registry.notify(&change(7));
        assert_eq!(rx1.recv().unwrap(), change(7));
        assert_eq!(rx2.recv().unwrap(), change(7));
    }
}
