//! Webhook `Notifier`: POSTs each event as JSON to a configured URL.
//! Delivery failures are logged and swallowed — notification is never on
//! the critical path (spec §7, grounded in `feishu_notify`'s
//! fire-and-forget `threading.Thread` dispatch).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use crate::domain::ports::{Notifier, TaskEvent};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpWebhookNotifier {
    http: Client,
    webhook_url: String,
}

impl HttpWebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            http: Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl Notifier for HttpWebhookNotifier {
    async fn notify(&self, event: TaskEvent) {
        let result = self
            .http
            .post(&self.webhook_url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&event)
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), url = %self.webhook_url, "webhook notification rejected");
            }
            Err(err) => {
                warn!(error = %err, url = %self.webhook_url, "webhook notification failed");
            }
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn delivers_event_as_json_post() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = HttpWebhookNotifier::new(server.uri());
        notifier
            .notify(TaskEvent::TaskCompleted {
                task_id: Uuid::new_v4(),
                total_images: 4,
            })
            .await;

        server.verify().await;
    }

    #[tokio::test]
    async fn unreachable_endpoint_does_not_panic() {
        let notifier = HttpWebhookNotifier::new("http://127.0.0.1:1".to_string());
        notifier.notify(TaskEvent::TaskCancelled { task_id: Uuid::new_v4() }).await;
    }
}
