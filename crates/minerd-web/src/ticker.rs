//! Mining info ticker.
//!
//! Polls the miner at a fixed interval and publishes a `mining_info` push
//! message whenever a new block shows up.

use std::sync::Arc;
use std::time::Duration;

use minerd_core::{Miner, MiningInfo};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::hub::BroadcastHub;
use crate::types::PushMessage;

/// Run the ticker until the task is aborted.
pub async fn run_info_ticker(miner: Arc<dyn Miner>, hub: BroadcastHub, interval_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last: Option<MiningInfo> = None;
    loop {
        interval.tick().await;

        let info = miner.current_info();
        let changed = last.as_ref().map_or(true, |prev| info.is_new_block(prev));
        if !changed {
            continue;
        }

        match PushMessage::MiningInfo(info.clone()).encode() {
            Ok(json) => {
                let receivers = hub.publish(json);
                trace!(height = info.height, receivers, "Published mining info");
            }
            Err(e) => {
                debug!(error = %e, "Failed to serialize mining info");
            }
        }
        last = Some(info);
    }
}
