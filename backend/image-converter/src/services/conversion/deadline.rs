/// Invocation deadline enforcement
use crate::error::{ConvertError, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Pipeline stage that can block on I/O or the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Publishing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetching => write!(f, "fetching source object"),
            Stage::Publishing => write!(f, "publishing converted object"),
        }
    }
}

/// Run `future` until `deadline`; on expiry the future is dropped, which
/// releases any stream it holds, and `ConvertError::Deadline` is returned.
///
/// `budget` is the full invocation allowance and only feeds the error.
pub async fn within_deadline<F, T>(
    stage: Stage,
    deadline: Instant,
    budget: Duration,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout_at(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(ConvertError::Deadline {
            stage,
            after: budget,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_before_deadline() {
        let deadline = Instant::now() + Duration::from_secs(1);
        let result = within_deadline(Stage::Fetching, deadline, Duration::from_secs(1), async {
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_deadline_elapsed() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let result = within_deadline(
            Stage::Publishing,
            deadline,
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(42)
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(ConvertError::Deadline {
                stage: Stage::Publishing,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let deadline = Instant::now() + Duration::from_secs(1);
        let result: Result<()> =
            within_deadline(Stage::Fetching, deadline, Duration::from_secs(1), async {
                Err(ConvertError::ConfigMissing("DESTINATION_BUCKET"))
            })
            .await;
        assert!(matches!(result, Err(ConvertError::ConfigMissing(_))));
    }
}
