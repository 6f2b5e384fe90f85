//! Reachability check for the application under test

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Poll `url` until it answers with a success status or `timeout` elapses
pub async fn wait_until_reachable(url: &str, timeout: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    while start.elapsed() < timeout {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Application is reachable at {}", url);
                return Ok(());
            }
            Ok(resp) => {
                warn!("{} returned {}", url, resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {}...", url);
                }
                // Connection refused is expected while the app is starting
                if !e.is_connect() {
                    warn!("Reachability check error: {}", e);
                }
            }
        }

        sleep(Duration::from_millis(100)).await;
    }

    Err(E2eError::AppUnreachable {
        url: url.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!("{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}/studygroups", addr)
    }

    #[tokio::test]
    async fn test_reachable_app() {
        let url = serve_once("HTTP/1.1 200 OK").await;
        wait_until_reachable(&url, Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_unreachable() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable").await;
        let err = wait_until_reachable(&url, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::AppUnreachable { attempts, .. } if attempts >= 1));
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = wait_until_reachable(&format!("http://127.0.0.1:{}/", port), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::AppUnreachable { .. }));
    }
}
