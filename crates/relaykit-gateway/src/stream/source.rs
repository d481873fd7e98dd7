//! Event sources that drive stream sessions.

use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// One periodic-mode tick. `seq` starts at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub seq: u64,
}

/// Shortest tick period; shorter (including zero) periods are raised to it.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Ticks every `period`, first one after a full period. Ticks missed while
/// the producer was busy are skipped, never bursted.
pub fn ticks(period: Duration) -> impl Stream<Item = Tick> + Send {
    let period = period.max(MIN_TICK_PERIOD);
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    stream::unfold((timer, 0u64), |(mut timer, seq)| async move {
        timer.tick().await;
        Some((Tick { seq }, (timer, seq + 1)))
    })
}

/// Subscribe a session to a broadcast channel. Lagged events are dropped
/// with a warning; the stream ends when every sender is gone.
pub fn broadcast_source<E>(rx: broadcast::Receiver<E>) -> impl Stream<Item = E> + Send
where
    E: Clone + Send + 'static,
{
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((event, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event source lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// Feed a session from a dedicated mpsc channel.
pub fn channel_source<E>(rx: mpsc::Receiver<E>) -> impl Stream<Item = E> + Send
where
    E: Send + 'static,
{
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) })
}
