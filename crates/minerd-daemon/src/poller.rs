//! Mining info polling of the pool backend.

use crate::error::AppResult;
use crate::miner::LocalMiner;
use minerd_core::MiningInfo;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fetch the current block from `{pool_url}/burst?requestType=getMiningInfo`.
pub async fn fetch_mining_info(client: &reqwest::Client, pool_url: &str) -> AppResult<MiningInfo> {
    let url = format!("{}/burst", pool_url.trim_end_matches('/'));
    let info = client
        .get(url)
        .query(&[("requestType", "getMiningInfo")])
        .send()
        .await?
        .error_for_status()?
        .json::<MiningInfo>()
        .await?;
    Ok(info)
}

/// Poll the pool until `token` is cancelled and feed new blocks to `miner`.
///
/// Failures are logged once per streak and do not stop the poller.
pub async fn run_pool_poller(
    client: reqwest::Client,
    pool_url: String,
    miner: LocalMiner,
    interval: Duration,
    token: CancellationToken,
) {
    info!(pool = %pool_url, interval_ms = interval.as_millis() as u64, "Pool poller started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failing = false;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Pool poller stopped");
                return;
            }
            _ = ticker.tick() => {
                match fetch_mining_info(&client, &pool_url).await {
                    Ok(info) => {
                        if failing {
                            info!(pool = %pool_url, "Pool reachable again");
                            failing = false;
                        }
                        miner.set_info(info);
                    }
                    Err(e) => {
                        if !failing {
                            warn!(pool = %pool_url, error = %e, "Failed to fetch mining info");
                            failing = true;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minerd_core::{Miner, MinerSettings};
    use minerd_web::BroadcastHub;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned `getMiningInfo` answer per connection.
    async fn pool_stub(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_fetch_mining_info() {
        let url = pool_stub(
            r#"{"height":"900","baseTarget":"70000","generationSignature":"beef","targetDeadline":3600}"#,
        )
        .await;

        let info = fetch_mining_info(&reqwest::Client::new(), &url).await.unwrap();
        assert_eq!(info.height, 900);
        assert_eq!(info.target_deadline, 3600);
    }

    #[tokio::test]
    async fn test_unreachable_pool_is_error() {
        let result = fetch_mining_info(&reqwest::Client::new(), "http://127.0.0.1:1").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_poller_updates_miner_until_cancelled() {
        let url = pool_stub(r#"{"height":5,"baseTarget":1,"generationSignature":"ab"}"#).await;
        let miner = LocalMiner::new(MinerSettings::default(), BroadcastHub::new(4, 1));
        let token = CancellationToken::new();

        let handle = tokio::spawn(run_pool_poller(
            reqwest::Client::new(),
            url,
            miner.clone(),
            Duration::from_millis(20),
            token.clone(),
        ));

        tokio::time::timeout(Duration::from_secs(2), async {
            while miner.current_info().height != 5 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
