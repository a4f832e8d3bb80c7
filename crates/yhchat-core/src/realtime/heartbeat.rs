//! Heartbeat task feeding the session's outbound queue.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec;

/// Queue a heartbeat frame every `period` until cancelled or the outbound
/// queue closes. The first beat goes out one full period after start.
pub(crate) async fn run_heartbeat_loop(
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let frame = match codec::encode_heartbeat() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "Failed to encode heartbeat");
                break;
            }
        };
        debug!("Sending heartbeat");
        if outbound.send(frame).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> Vec<serde_json::Value> {
        let mut beats = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            beats.push(serde_json::from_slice(&frame).unwrap());
        }
        beats
    }

    #[tokio::test(start_paused = true)]
    async fn beats_on_the_interval_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat_loop(
            tx,
            Duration::from_secs(30),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(drain(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let beats = drain(&mut rx);
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0]["cmd"], "heartbeat");

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(drain(&mut rx).len(), 1);

        cancel.cancel();
        task.await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_queue_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let task = tokio::spawn(run_heartbeat_loop(
            tx,
            Duration::from_secs(1),
            CancellationToken::new(),
        ));
        task.await.unwrap();
    }
}
