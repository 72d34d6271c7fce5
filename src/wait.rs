//! Synchronous-looking wait helper over the task wire model.
//!
//! [`wait_with`] is the polling core: it drives any async fetch until
//! the model turns terminal or the deadline passes. [`WaitClient`]
//! binds it to the HTTP read endpoint via reqwest.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{TrackerError, TrackerResult};
use crate::models::{TaskModel, TaskStatus};

#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    /// Fixed delay between polls.
    pub interval: Duration,
    /// Overall deadline; exceeding it fails with `Timeout`.
    pub timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Poll `fetch` until the task reaches a terminal state.
///
/// Returns the unwrapped `result.data` on completion. A `failed` status
/// becomes a [`TrackerError::TaskFailed`] carrying the task's own error
/// message — distinct from protocol failures, which pass through as-is.
pub async fn wait_with<F, Fut>(mut fetch: F, opts: WaitOptions) -> TrackerResult<serde_json::Value>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TrackerResult<TaskModel>>,
{
    let poll = async {
        // The first tick fires immediately, so a task that is already
        // terminal returns without sleeping.
        let mut tick = tokio::time::interval(opts.interval);
        loop {
            tick.tick().await;
            let model = fetch().await?;
            match model.status {
                TaskStatus::Started => {}
                TaskStatus::Failed => {
                    let message = model
                        .error
                        .unwrap_or_else(|| "task failed without a message".to_string());
                    return Err(TrackerError::TaskFailed(message));
                }
                TaskStatus::Completed => {
                    return Ok(model
                        .result
                        .map(|envelope| envelope.data)
                        .unwrap_or(serde_json::Value::Null));
                }
            }
        }
    };

    match tokio::time::timeout(opts.timeout, poll).await {
        Ok(outcome) => outcome,
        Err(_) => Err(TrackerError::Timeout(opts.timeout)),
    }
}

/// HTTP wait client polling `GET <base_url>/r/<resource>`.
pub struct WaitClient {
    http: reqwest::Client,
    base_url: String,
}

impl WaitClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Wait until `resource` terminates, decoding its result into `T`.
    pub async fn wait<T: DeserializeOwned>(
        &self,
        resource: &str,
        opts: WaitOptions,
    ) -> TrackerResult<T> {
        let url = format!("{}/r/{}", self.base_url, resource);
        let data = wait_with(
            || {
                let http = self.http.clone();
                let url = url.clone();
                async move {
                    let response = http.get(&url).send().await?;
                    if response.status() == reqwest::StatusCode::NOT_FOUND {
                        return Err(TrackerError::NotFound(url.clone()));
                    }
                    let model = response.error_for_status()?.json::<TaskModel>().await?;
                    Ok(model)
                }
            },
            opts,
        )
        .await?;
        Ok(serde_json::from_value(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultEnvelope;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use serde_json::json;

    fn started() -> TaskModel {
        TaskModel {
            status: TaskStatus::Started,
            progress: 0,
            error: None,
            result: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_result_once_completed() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let outcome = wait_with(
            move || {
                let counter = counter.clone();
                async move {
                    // Terminal on the third poll, i.e. after 2x the interval.
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Ok(started())
                    } else {
                        Ok(TaskModel {
                            status: TaskStatus::Completed,
                            progress: 100,
                            error: None,
                            result: Some(ResultEnvelope { data: json!(42) }),
                        })
                    }
                }
            },
            WaitOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, json!(42));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_error_message_is_surfaced() {
        let err = wait_with(
            || async {
                Ok(TaskModel {
                    status: TaskStatus::Failed,
                    progress: 0,
                    error: Some("Unknown error".to_string()),
                    result: None,
                })
            },
            WaitOptions::default(),
        )
        .await
        .unwrap_err();

        match err {
            TrackerError::TaskFailed(message) => assert_eq!(message, "Unknown error"),
            other => panic!("expected TaskFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_times_out() {
        let opts = WaitOptions {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(100),
        };
        let err = wait_with(|| async { Ok(started()) }, opts)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fetch_errors_pass_through() {
        let err = wait_with(
            || async { Err(TrackerError::Internal("connection refused".to_string())) },
            WaitOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TrackerError::Internal(_)));
    }
}
