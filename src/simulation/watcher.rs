//! Definition file watcher
//!
//! A tokio task polls the modification times of both definition files and
//! sends a `ReloadRequest` through a bounded channel when either changes.
//! The simulation drains the channel once per tick; it never blocks on it.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::simulation::reload::ReloadRequest;
use crate::simulation::world::StopHandle;

const CHANNEL_CAPACITY: usize = 4;

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
}

/// Spawn the watcher on `runtime`; the task ends on a stop request or when
/// the receiver is dropped
pub fn spawn_watcher(
    runtime: &Handle,
    network: PathBuf,
    trains: PathBuf,
    interval: Duration,
    stop: StopHandle,
) -> (mpsc::Receiver<ReloadRequest>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let task = runtime.spawn(async move {
        let mut last = (modified(&network).await, modified(&trains).await);
        let mut ticker = tokio::time::interval(interval);
        info!(network = %network.display(), trains = %trains.display(), "watching definition files");

        loop {
            ticker.tick().await;
            if stop.is_stop_requested() {
                break;
            }
            let current = (modified(&network).await, modified(&trains).await);
            if current == last {
                continue;
            }
            last = current;

            let request = ReloadRequest {
                network: network.clone(),
                trains: trains.clone(),
            };
            match tx.try_send(request) {
                Ok(()) => debug!("definition change queued"),
                // The simulation has not caught up; it will still see a request
                Err(TrySendError::Full(_)) => debug!("reload already pending"),
                Err(TrySendError::Closed(_)) => break,
            }
        }
    });

    (rx, task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_is_reported() {
        let dir = std::env::temp_dir().join(format!("railsim-watch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let net = dir.join("net.toml");
        let trains = dir.join("trains.toml");
        std::fs::write(&net, "").unwrap();
        std::fs::write(&trains, "").unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let stop = StopHandle::new();
        let (mut rx, task) = spawn_watcher(
            runtime.handle(),
            net.clone(),
            trains.clone(),
            Duration::from_millis(20),
            stop.clone(),
        );

        runtime.block_on(async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            // Push the mtime forward explicitly; coarse clocks may not tick
            let later = SystemTime::now() + Duration::from_secs(5);
            std::fs::File::options()
                .write(true)
                .open(&net)
                .unwrap()
                .set_modified(later)
                .unwrap();
            let request = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(request.network, net);
            stop.request_stop();
            task.await.unwrap();
        });
    }
}
