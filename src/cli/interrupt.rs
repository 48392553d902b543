//! Ctrl-C handling for long-running commands.

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exit status after a forced quit (128 + SIGINT).
pub const FORCED_EXIT_CODE: i32 = 130;

/// Cancel `cancel` on the first interrupt and return `true` on the second.
///
/// `next` resolves once per interrupt, to `false` when no further interrupt
/// can be received.
pub async fn wait_for_forced_quit<F, Fut>(mut next: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !next().await {
        return false;
    }
    warn!("Interrupt received, stopping after the current item (Ctrl-C again to quit now)");
    cancel.cancel();

    if !next().await {
        return false;
    }
    warn!("Second interrupt, quitting");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_interrupt_forces_quit() {
        let cancel = CancellationToken::new();
        assert!(wait_for_forced_quit(|| async { true }, cancel.clone()).await);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let cancel = CancellationToken::new();
        let mut left = 1;
        let forced = wait_for_forced_quit(
            move || {
                let received = left > 0;
                left -= 1;
                async move { received }
            },
            cancel.clone(),
        )
        .await;

        assert!(!forced);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_no_interrupt_leaves_token() {
        let cancel = CancellationToken::new();
        assert!(!wait_for_forced_quit(|| async { false }, cancel.clone()).await);
        assert!(!cancel.is_cancelled());
    }
}
