//! Default `Notifier`: every event becomes a structured `tracing` event.
//! Always wired in, even when a webhook is also configured, so events are
//! never silently dropped by a misconfigured or unreachable endpoint.

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::{Notifier, TaskEvent};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, event: TaskEvent) {
        info!(event = ?event, "task event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn notify_never_panics_for_any_event_variant() {
        let notifier = LoggingNotifier;
        notifier
            .notify(TaskEvent::TaskSubmitted {
                task_id: Uuid::new_v4(),
                task_name: "sample".to_string(),
            })
            .await;
        notifier
            .notify(TaskEvent::TaskCancelled { task_id: Uuid::new_v4() })
            .await;
    }
}
