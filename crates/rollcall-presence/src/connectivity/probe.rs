//! TCP-connect reachability probe.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::PresenceError;
use crate::store::Reachability;

/// Treats the network path as usable when a TCP connect to `target`
/// completes within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpReachability {
    target: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl TcpReachability {
    pub fn new(target: impl Into<String>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            poll_interval,
            timeout,
        }
    }

    async fn connect_once(target: &str, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                trace!(addr = %target, error = %e, "reachability connect failed");
                false
            }
            Err(_) => {
                trace!(addr = %target, "reachability connect timed out");
                false
            }
        }
    }
}

#[async_trait]
impl Reachability for TcpReachability {
    fn readings(&self) -> mpsc::UnboundedReceiver<Result<bool, PresenceError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let target = self.target.clone();
        let timeout = self.timeout;
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let reachable = Self::connect_once(&target, timeout).await;
                if tx.send(Ok(reachable)).is_err() {
                    break;
                }
            }
        });

        rx
    }

    async fn probe(&self) -> Result<bool, PresenceError> {
        Ok(Self::connect_once(&self.target, self.timeout).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let reach = TcpReachability::new(addr, Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(reach.probe().await, Ok(true));
    }

    #[tokio::test]
    async fn probe_fails_against_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let reach = TcpReachability::new(addr, Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(reach.probe().await, Ok(false));
    }

    #[tokio::test]
    async fn readings_emit_until_receiver_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let reach = TcpReachability::new(addr, Duration::from_millis(10), Duration::from_secs(1));
        let mut rx = reach.readings();
        assert_eq!(rx.recv().await, Some(Ok(true)));
        assert_eq!(rx.recv().await, Some(Ok(true)));
    }
}
