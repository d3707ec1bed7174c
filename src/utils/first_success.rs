// src/utils/first_success.rs
//! Concurrent "first success wins" lookups.
//!
//! All candidates run as tasks of one `JoinSet`. The first `Ok` is returned and
//! the remaining tasks are aborted; no task outlives the call.

use std::future::Future;
use tokio::task::JoinSet;

/// Runs every future concurrently and returns the first successful result.
///
/// # Returns
/// - `Ok(value)` from the earliest future to succeed
/// - `Err(errors)` with every failure when none succeed (empty when no futures were given)
pub async fn first_success<T, E, F>(futures: Vec<F>) -> Result<T, Vec<E>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let mut set = JoinSet::new();
    for future in futures {
        set.spawn(future);
    }

    let mut errors = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(value)) => {
                set.abort_all();
                return Ok(value);
            }
            Ok(Err(e)) => errors.push(e),
            // a panicked candidate counts as neither success nor a reportable error
            Err(join_err) => log::warn!("first_success candidate failed to join: {}", join_err),
        }
    }
    Err(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::time::Duration;

    type Candidate = Pin<Box<dyn Future<Output = Result<u32, String>> + Send>>;

    #[tokio::test]
    async fn test_returns_fastest_success() {
        let candidates: Vec<Candidate> = vec![
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            }),
            Box::pin(async { Err("down".to_string()) }),
            Box::pin(async { Ok(3) }),
        ];

        let started = std::time::Instant::now();
        assert_eq!(first_success(candidates).await, Ok(3));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_collects_all_errors() {
        let candidates: Vec<Candidate> = vec![
            Box::pin(async { Err("a".to_string()) }),
            Box::pin(async { Err("b".to_string()) }),
        ];

        let mut errors = first_success(candidates).await.unwrap_err();
        errors.sort();
        assert_eq!(errors, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_input_is_an_empty_error() {
        let candidates: Vec<Candidate> = Vec::new();
        assert_eq!(first_success(candidates).await, Err(Vec::new()));
    }
}
