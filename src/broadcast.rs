// SPDX-License-Identifier: Apache-2.0

//! Broadcaster: serializes a [`TrackedFrame`] to the wire schema and fans it
//! out to every connected viewer. Best-effort delivery — a full or closed
//! subscriber channel is pruned on the next frame, never awaited, so the
//! pipeline can never stall behind a slow viewer.

use std::sync::Mutex;

use kanal::{bounded_async, AsyncReceiver, AsyncSender};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::types::TrackedFrame;

/// Outgoing queue depth per subscriber. A subscriber that can't keep up with
/// this many frames in flight is treated as disconnected.
const SUBSCRIBER_QUEUE_DEPTH: usize = 8;

#[derive(Serialize)]
struct WireFrame<'a> {
    points: Vec<WirePoint>,
    clusters: &'a std::collections::BTreeMap<i32, crate::types::ClusterInfo>,
    alerts: &'a [String],
}

#[derive(Serialize)]
struct WirePoint {
    x: f32,
    y: f32,
    z: f32,
    theta: f32,
    cluster_id: i32,
}

impl<'a> From<&'a TrackedFrame> for WireFrame<'a> {
    fn from(f: &'a TrackedFrame) -> Self {
        WireFrame {
            points: f
                .points
                .iter()
                .map(|p| WirePoint {
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    theta: p.theta,
                    cluster_id: p.cluster_id,
                })
                .collect(),
            clusters: &f.clusters,
            alerts: &f.alerts,
        }
    }
}

pub struct Subscriber {
    tx: AsyncSender<String>,
}

/// A fresh subscriber's receive half, handed to the WebSocket acceptor so it
/// can forward messages onto the socket.
pub struct SubscriberHandle {
    pub rx: AsyncReceiver<String>,
}

#[derive(Default)]
pub struct SubscriberSet {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new viewer and returns the receive half of its queue.
    pub fn subscribe(&self) -> SubscriberHandle {
        let (tx, rx) = bounded_async(SUBSCRIBER_QUEUE_DEPTH);
        self.subscribers.lock().unwrap().push(Subscriber { tx });
        SubscriberHandle { rx }
    }

    /// Serializes `frame` once and pushes a copy to every subscriber whose
    /// queue has room, pruning any that are full or closed. The lock is held
    /// only across a non-blocking `try_send`, never across an awaited send —
    /// a slow or gone viewer is pruned immediately instead of stalling the
    /// pipeline.
    #[instrument(skip(self, frame), fields(frame_number = frame.frame_number))]
    pub fn broadcast(&self, frame: &TrackedFrame) {
        let wire = WireFrame::from(frame);
        let text = match serde_json::to_string(&wire) {
            Ok(t) => t,
            Err(e) => {
                warn!("failed to serialize frame {}: {}", frame.frame_number, e);
                return;
            }
        };

        // try_send never suspends, so holding the lock across it never stalls
        // the pipeline behind a slow viewer; it only serializes against the
        // acceptor task's subscribe/unsubscribe of the same Vec.
        let mut guard = self.subscribers.lock().unwrap();
        guard.retain(|s| s.tx.try_send(text.clone()).unwrap_or(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackedFrame;

    fn empty_frame(n: u64) -> TrackedFrame {
        TrackedFrame {
            frame_number: n,
            points: Vec::new(),
            clusters: Default::default(),
            alerts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_broadcast_frame() {
        let set = SubscriberSet::new();
        let handle = set.subscribe();
        set.broadcast(&empty_frame(1));
        let msg = handle.rx.recv().await.expect("channel still open");
        assert!(msg.contains("\"points\""));
        assert!(msg.contains("\"clusters\""));
        assert!(msg.contains("\"alerts\""));
    }

    #[tokio::test]
    async fn full_queue_drops_subscriber_without_blocking() {
        let set = SubscriberSet::new();
        let handle = set.subscribe();
        for i in 0..(SUBSCRIBER_QUEUE_DEPTH as u64 + 4) {
            set.broadcast(&empty_frame(i));
        }
        assert_eq!(set.subscribers.lock().unwrap().len(), 0);
        drop(handle);
    }
}
