use std::future::Future;
use tokio::time::{error::Elapsed, sleep, timeout, Instant};

use sshfwd_traits::forward::WaitPolicy;

/// Polls `condition` until it holds or `policy.timeout` elapses.
///
/// The pause between attempts grows with the time already spent (a tenth of it),
/// bounded by the policy's min and max interval.
pub async fn wait_for<F, Fut>(policy: &WaitPolicy, mut condition: F) -> Result<(), Elapsed>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let poll = async {
        loop {
            if condition().await {
                return;
            }
            let interval = (start.elapsed() / 10)
                .max(policy.min_interval)
                .min(policy.max_interval);
            sleep(interval).await;
        }
    };
    timeout(policy.timeout, poll).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::testing::short_policy;

    #[tokio::test]
    async fn test_wait_for_succeeds_once_condition_holds() {
        let mut attempts = 0;
        let result = wait_for(&short_policy(), || {
            attempts += 1;
            let ready = attempts >= 3;
            async move { ready }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let started = std::time::Instant::now();
        let result = wait_for(&short_policy(), || async { false }).await;
        assert!(result.is_err());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(5));
    }
}
