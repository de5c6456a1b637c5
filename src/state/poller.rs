//! 服务状态轮询
//!
//! 调用方持有 `PollHandle`，丢弃即停止轮询。状态通过 watch 通道发布，
//! 只在发生变化时（以及第一次探测后）通知订阅者。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use crate::domain::service::ServicesStatus;
use crate::services::status::StatusProbe;

pub struct PollHandle {
    status_rx: watch::Receiver<ServicesStatus>,
    _guard: DropGuard,
}

impl PollHandle {
    pub fn subscribe(&self) -> watch::Receiver<ServicesStatus> {
        self.status_rx.clone()
    }
}

/// 启动轮询任务
pub fn spawn_status_poller(probe: Arc<dyn StatusProbe>, interval: Duration) -> PollHandle {
    let (status_tx, status_rx) = watch::channel(ServicesStatus::default());
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first = true;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let status = probe.probe().await;
                    let changed = status_tx.send_if_modified(|current| {
                        let changed = first || *current != status;
                        *current = status;
                        changed
                    });
                    if changed && !first {
                        info!(
                            apache = status.apache,
                            mysql = status.mysql,
                            php = status.php,
                            "Service status changed"
                        );
                    }
                    first = false;
                }
            }
        }
        debug!("Status poller stopped");
    });

    PollHandle {
        status_rx,
        _guard: cancel_token.drop_guard(),
    }
}
