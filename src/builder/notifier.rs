use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NotifySettings;

use super::models::NotificationPayload;

/// Delivers a JSON body to a callback URL and reports the HTTP status code.
/// Real implementation: `HttpCallbackClient`. Test double: `fakes::ScriptedCallbackClient`.
#[async_trait]
pub trait CallbackClient: Send + Sync {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16>;
}

pub struct HttpCallbackClient {
    http: reqwest::Client,
}

impl HttpCallbackClient {
    /// `timeout` bounds a single attempt, including reading the response.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl CallbackClient for HttpCallbackClient {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16> {
        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let text = resp.text().await.unwrap_or_default();
            debug!(url, status, body = %text.chars().take(200).collect::<String>(), "callback response body");
        }
        Ok(status)
    }
}

/// Summary of one delivery sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyReport {
    pub attempts: u32,
    pub delivered: bool,
}

/// Sleep durations after each failed attempt: `initial`, doubled each time.
pub fn backoff_delays(max_retries: u32, initial: Duration) -> Vec<Duration> {
    (0..max_retries).map(|i| initial * 2u32.pow(i)).collect()
}

/// Best-effort result delivery with bounded exponential backoff.
///
/// Success is HTTP 200 exactly; any other status or a transport error counts
/// as a failed attempt. Each call runs its own backoff sequence and never
/// returns an error.
pub struct NotificationDispatcher {
    client: Arc<dyn CallbackClient>,
    max_retries: u32,
    initial_delay: Duration,
}

impl NotificationDispatcher {
    pub fn new(client: Arc<dyn CallbackClient>, settings: &NotifySettings) -> Self {
        Self {
            client,
            max_retries: settings.max_retries,
            initial_delay: settings.initial_delay,
        }
    }

    pub async fn notify(&self, url: &str, payload: &NotificationPayload) -> NotifyReport {
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(url, error = %e, "failed to encode notification payload");
                return NotifyReport {
                    attempts: 0,
                    delivered: false,
                };
            }
        };

        let delays = backoff_delays(self.max_retries, self.initial_delay);
        for (attempt, delay) in (1..).zip(delays) {
            match self.client.post_json(url, &body).await {
                Ok(200) => {
                    info!(url, attempt, task = %payload.task, "evaluation server notified");
                    return NotifyReport {
                        attempts: attempt,
                        delivered: true,
                    };
                }
                Ok(status) => warn!(url, attempt, status, "notification not accepted"),
                Err(e) => warn!(url, attempt, error = %e, "notification request failed"),
            }

            info!(url, attempt, delay_secs = delay.as_secs_f64(), "retrying notification");
            tokio::time::sleep(delay).await;
        }

        warn!(
            event = "notification_exhausted",
            url,
            attempts = self.max_retries,
            task = %payload.task,
            nonce = %payload.nonce,
            "failed to notify evaluation server"
        );
        NotifyReport {
            attempts: self.max_retries,
            delivered: false,
        }
    }

    /// Run `notify` on its own task so the backoff sleeps only suspend this delivery.
    pub fn spawn(self: &Arc<Self>, url: String, payload: NotificationPayload) -> JoinHandle<NotifyReport> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.notify(&url, &payload).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedCallbackClient;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> NotificationPayload {
        NotificationPayload {
            email: "student@example.com".into(),
            task: "captcha-solver-001".into(),
            round: 1,
            nonce: "1234".into(),
            repo_url: "https://github.com/student/captcha-solver-001".into(),
            commit_sha: "abc".into(),
            pages_url: "https://student.github.io/captcha-solver-001/".into(),
        }
    }

    fn dispatcher(client: Arc<dyn CallbackClient>, max_retries: u32) -> NotificationDispatcher {
        NotificationDispatcher::new(
            client,
            &NotifySettings {
                max_retries,
                initial_delay: Duration::from_secs(1),
                request_timeout: Duration::from_secs(5),
            },
        )
    }

    #[test]
    fn test_backoff_delays_default_schedule() {
        let secs: Vec<u64> = backoff_delays(5, Duration::from_secs(1))
            .iter()
            .map(Duration::as_secs)
            .collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts_with_doubling_delays() {
        let client = Arc::new(ScriptedCallbackClient::always(500));
        let d = dispatcher(client.clone(), 5);

        let start = tokio::time::Instant::now();
        let report = d.notify("https://eval.example/notify", &payload()).await;

        assert_eq!(report, NotifyReport { attempts: 5, delivered: false });
        assert_eq!(client.calls().len(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2 + 4 + 8 + 16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_first_200() {
        let client = Arc::new(ScriptedCallbackClient::sequence(vec![
            Err("connection refused".into()),
            Ok(503),
            Ok(200),
        ]));
        let d = dispatcher(client.clone(), 5);

        let start = tokio::time::Instant::now();
        let report = d.notify("https://eval.example/notify", &payload()).await;

        assert_eq!(report, NotifyReport { attempts: 3, delivered: true });
        assert_eq!(client.calls().len(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_2xx_is_failure() {
        let client = Arc::new(ScriptedCallbackClient::sequence(vec![Ok(201), Ok(204)]));
        let d = dispatcher(client.clone(), 2);

        let report = d.notify("https://eval.example/notify", &payload()).await;
        assert!(!report.delivered);
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_notification_does_not_block_caller() {
        let client = Arc::new(ScriptedCallbackClient::always(500));
        let d = Arc::new(dispatcher(client, 5));

        let handle = d.spawn("https://eval.example/notify".into(), payload());
        // The caller proceeds immediately; the backoff runs on the spawned task.
        assert!(!handle.is_finished());
        let report = handle.await.unwrap();
        assert_eq!(report.attempts, 5);
    }

    #[tokio::test]
    async fn test_payload_posted_as_json_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(body_json(serde_json::to_value(payload()).unwrap()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpCallbackClient::new(Duration::from_secs(5)).unwrap();
        let d = dispatcher(Arc::new(client), 5);
        let report = d.notify(&format!("{}/notify", server.uri()), &payload()).await;
        assert_eq!(report, NotifyReport { attempts: 1, delivered: true });
    }

    #[tokio::test]
    async fn test_stalled_callback_counts_as_failed_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let settings = NotifySettings {
            max_retries: 3,
            initial_delay: Duration::from_millis(10),
            request_timeout: Duration::from_millis(100),
        };
        let client = HttpCallbackClient::new(settings.request_timeout).unwrap();
        let d = NotificationDispatcher::new(Arc::new(client), &settings);

        let url = format!("{}/notify", server.uri());
        let report = tokio::time::timeout(Duration::from_secs(10), d.notify(&url, &payload()))
            .await
            .expect("every attempt should time out well before the outer guard");

        assert_eq!(report, NotifyReport { attempts: 3, delivered: false });
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }
}
