use std::time::Duration;

use chrono::{DateTime, Utc};
use hive_shared::{format_relative_time, seconds_between};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const REFRESH_PERIOD: Duration = Duration::from_secs(60);

/// "5 minutes ago" for an open thread, re-derived from `created_at` on a fixed period.
///
/// The refresh task lives as long as the label; dropping the label stops it.
#[derive(Debug)]
pub struct TimeLabel {
    rx: watch::Receiver<String>,
    task: JoinHandle<()>,
}

impl TimeLabel {
    pub fn spawn(created_at: DateTime<Utc>) -> Self {
        Self::spawn_with(created_at, REFRESH_PERIOD, Utc::now)
    }

    pub fn spawn_with<C>(created_at: DateTime<Utc>, period: Duration, clock: C) -> Self
    where
        C: Fn() -> DateTime<Utc> + Send + 'static,
    {
        let render = move || format_relative_time(seconds_between(created_at, clock()));
        let (tx, rx) = watch::channel(render());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(render()).is_err() {
                    break;
                }
            }
        });

        Self { rx, task }
    }

    pub fn current(&self) -> String {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.rx.clone()
    }
}

impl Drop for TimeLabel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn fake_clock(base: DateTime<Utc>) -> (Arc<AtomicI64>, impl Fn() -> DateTime<Utc> + Send + 'static) {
        let offset = Arc::new(AtomicI64::new(0));
        let shared = offset.clone();
        let clock = move || base + chrono::Duration::seconds(shared.load(Ordering::SeqCst));
        (offset, clock)
    }

    #[tokio::test(start_paused = true)]
    async fn label_follows_the_clock() {
        let created = Utc::now();
        let (offset, clock) = fake_clock(created);
        let label = TimeLabel::spawn_with(created, REFRESH_PERIOD, clock);
        let mut rx = label.subscribe();
        assert_eq!(label.current(), "less than a minute ago");

        offset.store(120, Ordering::SeqCst);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), "2 minutes ago");

        offset.store(3 * 3600, Ordering::SeqCst);
        rx.changed().await.unwrap();
        assert_eq!(label.current(), "3 hours ago");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_label_stops_refreshing() {
        let created = Utc::now();
        let (_offset, clock) = fake_clock(created);
        let label = TimeLabel::spawn_with(created, REFRESH_PERIOD, clock);
        let mut rx = label.subscribe();

        drop(label);
        assert!(rx.changed().await.is_err());
    }
}
