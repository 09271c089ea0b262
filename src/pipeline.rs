// SPDX-License-Identifier: Apache-2.0

//! Pipeline: owns the Assembler and Tracker's persistent state exclusively
//! and drives decode → assemble → filter → cluster → track → broadcast for
//! every datagram, per the single-task ownership rule in the concurrency
//! design. Nothing outside this task ever touches assembler or tracker
//! state.

use std::sync::Arc;

use kanal::AsyncReceiver;
use tracing::{info, instrument, warn};

use crate::assembler::FrameAssembler;
use crate::broadcast::SubscriberSet;
use crate::cluster;
use crate::cluster::tracker::Tracker;
use crate::config::Configuration;
use crate::decode;
use crate::filter;
use crate::types::TrackedFrame;

/// Runs forever, consuming raw datagrams from `rx` and broadcasting a
/// processed [`TrackedFrame`] to `subscribers` each time a frame completes.
#[instrument(skip_all)]
pub async fn run(
    rx: AsyncReceiver<Vec<u8>>,
    subscribers: Arc<SubscriberSet>,
    config: Arc<std::sync::Mutex<Configuration>>,
) {
    let mut assembler = FrameAssembler::new();
    let mut tracker = Tracker::new();

    loop {
        let datagram = match rx.recv().await {
            Ok(d) => d,
            Err(e) => {
                warn!("ingestion channel closed, stopping pipeline: {:?}", e);
                return;
            }
        };

        let Some(module) = decode::decode_datagram(&datagram) else {
            continue;
        };

        let Some(frame) = assembler.ingest(module) else {
            continue;
        };

        let cfg = config.lock().unwrap().clone();

        let mut points = filter::apply(frame.points, &cfg);
        if points.is_empty() {
            continue;
        }

        let raw_clusters = cluster::cluster(&mut points, cfg.dbscan_eps as f64, cfg.dbscan_min_samples);
        let (clusters, alerts) = tracker.track(&raw_clusters, &mut points, &cfg, frame.frame_number);

        info!(
            frame_number = frame.frame_number,
            clusters = clusters.len(),
            alerts = alerts.len(),
            "frame processed"
        );

        let tracked = TrackedFrame {
            frame_number: frame.frame_number,
            points,
            clusters,
            alerts,
        };

        subscribers.broadcast(&tracked);
    }
}
