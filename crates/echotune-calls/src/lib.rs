// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call-and-stream orchestration core.
//!
//! Assistant pool and admission, the per-chat playback controller, the media
//! description builder, and the event router. Everything here talks to the
//! chat platform, the call engine, and the store through the trait seams in
//! `echotune-core`.

pub mod admission;
pub mod controller;
pub mod engine;
pub mod gates;
pub mod media;
pub mod pool;
pub mod router;
pub mod sessions;

pub use admission::Admission;
pub use controller::{NextOutcome, PlayOutcome, PlaybackController};
pub use engine::EngineHandle;
pub use gates::{GateKind, Gates};
pub use pool::{Assistant, AssistantPool, Connector};
pub use router::EventRouter;

use echotune_core::Error;

/// Runs `op`, sleeping out one flood-wait and retrying once before giving
/// up. All other errors pass through untouched.
pub async fn with_flood_retry<T, F, Fut>(op: F) -> Result<T, Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    match op().await {
        Err(Error::RateLimited { retry_after }) => {
            tracing::warn!(?retry_after, "flood wait, sleeping before retry");
            tokio::time::sleep(retry_after).await;
            op().await
        }
        result => result,
    }
}

/// Dimensions of the first video stream, used by the media builder.
pub(crate) async fn probe_dimensions(input: &str) -> Option<(u32, u32)> {
    echotune_resolver::probe::video_dimensions(input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn flood_wait_sleeps_and_retries_once() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, Error> = with_flood_retry(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::RateLimited {
                    retry_after: Duration::from_secs(5),
                })
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn second_flood_wait_is_fatal() {
        let result: Result<(), Error> = with_flood_retry(|| async {
            Err(Error::RateLimited {
                retry_after: Duration::from_millis(1),
            })
        })
        .await;
        assert!(matches!(result, Err(Error::RateLimited { .. })));
    }

    #[tokio::test]
    async fn other_errors_pass_through_without_retry() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), Error> = with_flood_retry(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Cancelled)
        })
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
