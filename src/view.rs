//! Per-view snapshot that only accepts the response to the newest request.
//!
//! A refresh issues a token; when the response lands it is committed with that
//! token. A view has at most one request outstanding, and responses to
//! superseded requests are dropped, so a slow old fetch can never overwrite a
//! newer one.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

pub struct LatestOnly<T> {
    issued: AtomicU64,
    in_flight: AtomicBool,
    snapshot: RwLock<Option<(RequestToken, T)>>,
}

impl<T: Clone> LatestOnly<T> {
    pub fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            snapshot: RwLock::new(None),
        }
    }

    /// Issue a token, or `None` while the previous request is unsettled.
    pub fn try_issue(&self) -> Option<RequestToken> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(RequestToken(self.issued.fetch_add(1, Ordering::SeqCst) + 1))
    }

    /// Release the slot held by a request that produced no value.
    pub fn settle(&self, token: RequestToken) {
        if token.0 == self.issued.load(Ordering::SeqCst) {
            self.in_flight.store(false, Ordering::SeqCst);
        }
    }

    /// Store `value` if `token` is the newest issued. Returns whether it was kept.
    pub async fn accept(&self, token: RequestToken, value: T) -> bool {
        if token.0 != self.issued.load(Ordering::SeqCst) {
            return false;
        }
        self.settle(token);
        let mut snapshot = self.snapshot.write().await;
        if matches!(snapshot.as_ref(), Some((held, _)) if *held >= token) {
            return false;
        }
        *snapshot = Some((token, value));
        true
    }

    pub async fn current(&self) -> Option<T> {
        self.snapshot.read().await.as_ref().map(|(_, v)| v.clone())
    }
}

impl<T: Clone> Default for LatestOnly<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Refresh `view` every `period` until `shutdown` resolves.
///
/// Ticks that land while a fetch is still outstanding are skipped. Each
/// accepted snapshot is handed to `frame`.
pub async fn refresh<T, E, F, Fut>(
    view: Arc<LatestOnly<T>>,
    period: Duration,
    fetch: F,
    mut frame: impl FnMut(&T) -> Result<()>,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    T: Clone + Send + 'static,
    E: Display + Send + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<(RequestToken, Result<T, E>)>(1);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(token) = view.try_issue() else {
                    debug!("previous refresh still in flight, skipping tick");
                    continue;
                };
                let request = fetch();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send((token, request.await)).await;
                });
            }
            Some((token, result)) = rx.recv() => match result {
                Ok(value) => {
                    if view.accept(token, value).await {
                        if let Some(snapshot) = view.current().await {
                            frame(&snapshot)?;
                        }
                    } else {
                        debug!(?token, "discarded stale response");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "refresh failed");
                    view.settle(token);
                }
            },
            _ = &mut shutdown => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_response_is_discarded() {
        let view = LatestOnly::new();
        let first = view.try_issue().unwrap();
        view.settle(first);
        let second = view.try_issue().unwrap();

        assert!(view.accept(second, "new").await);
        assert!(!view.accept(first, "old").await);
        assert_eq!(view.current().await, Some("new"));
    }

    #[tokio::test]
    async fn response_superseded_before_arrival_is_discarded() {
        let view = LatestOnly::new();
        let first = view.try_issue().unwrap();
        view.settle(first);
        let _second = view.try_issue().unwrap();

        assert!(!view.accept(first, 1).await);
        assert_eq!(view.current().await, None);
    }

    #[tokio::test]
    async fn duplicate_commit_is_ignored() {
        let view = LatestOnly::new();
        let token = view.try_issue().unwrap();
        assert!(view.accept(token, 1).await);
        assert!(!view.accept(token, 2).await);
        assert_eq!(view.current().await, Some(1));
    }

    #[tokio::test]
    async fn one_request_outstanding_at_a_time() {
        let view = LatestOnly::new();
        let first = view.try_issue().unwrap();
        assert!(view.try_issue().is_none());
        assert!(view.accept(first, 1).await);

        let second = view.try_issue().unwrap();
        assert!(second > first);
        view.settle(second);
        assert!(view.try_issue().is_some());
    }

    #[tokio::test]
    async fn slow_fetches_keep_rendering() {
        let view = Arc::new(LatestOnly::new());
        let counter = Arc::new(AtomicU64::new(0));
        let mut frames = Vec::new();

        // each fetch outlasts three refresh periods
        refresh(
            view.clone(),
            Duration::from_millis(10),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    tokio::time::sleep(Duration::from_millis(35)).await;
                    Ok::<_, String>(n)
                }
            },
            |n| {
                frames.push(*n);
                Ok(())
            },
            tokio::time::sleep(Duration::from_millis(400)),
        )
        .await
        .unwrap();

        assert!(frames.len() >= 2, "frames: {frames:?}");
        assert!(frames.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(view.current().await, frames.last().copied());
    }

    #[tokio::test]
    async fn failed_fetch_does_not_wedge_the_view() {
        let view = Arc::new(LatestOnly::new());
        let counter = Arc::new(AtomicU64::new(0));
        let mut frames = Vec::new();

        refresh(
            view,
            Duration::from_millis(10),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        Err("connection refused".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
            |n| {
                frames.push(*n);
                Ok(())
            },
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await
        .unwrap();

        assert!(!frames.is_empty());
        assert!(frames.iter().all(|n| *n > 1));
    }
}
