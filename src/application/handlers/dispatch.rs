use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    application::handlers::delivery::DeliveryHandler,
    domain::repositories::MessageStore,
    infrastructure::scheduler::{JobCallback, JobScheduler},
};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How often the loop re-discovers due messages from persistence.
    pub interval: Duration,
    /// Monitoring ping URL; `<url>/fail` is hit when a cycle errors.
    pub heartbeat_url: Option<String>,
}

/// Recurring trigger connecting persistence, the job scheduler and the
/// gateway. Each cycle fetches messages due within the coming interval and
/// registers one one-shot job per message at its exact send timestamp.
///
/// Failures are contained per message and per cycle; the trigger always
/// fires again at the next interval. Unfired jobs lost to a process restart
/// are re-discovered here, since only archived messages leave the due query.
pub struct DispatchLoop {
    messages: Arc<dyn MessageStore>,
    scheduler: Arc<JobScheduler>,
    delivery: Arc<DeliveryHandler>,
    http: Client,
    config: DispatchConfig,
}

impl DispatchLoop {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        scheduler: Arc<JobScheduler>,
        delivery: Arc<DeliveryHandler>,
        config: DispatchConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            messages,
            scheduler,
            delivery,
            http: Client::builder()
                .user_agent("snoozeplus/dispatch")
                .build()
                .expect("failed to build heartbeat client"),
            config,
        })
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            loop {
                ticker.tick().await;
                match self.run_cycle().await {
                    Ok(scheduled) => {
                        info!(scheduled, "dispatch cycle complete");
                        self.heartbeat(true).await;
                    }
                    Err(err) => {
                        error!(error = %err, "dispatch cycle failed");
                        self.heartbeat(false).await;
                    }
                }
            }
        })
    }

    /// One pass: fetch everything due before the next trigger and hand each
    /// message to the scheduler for precise delivery.
    pub async fn run_cycle(&self) -> anyhow::Result<usize> {
        let window_end = Utc::now()
            + chrono::Duration::from_std(self.config.interval)
                .unwrap_or_else(|_| chrono::Duration::hours(6));
        let due = self.messages.get_due_messages(window_end).await?;

        let mut scheduled = 0;
        for message in due {
            let job_id = message.id.to_string();
            let fire_at = message.send_date;
            let delivery = Arc::clone(&self.delivery);
            let callback: JobCallback = Box::pin(async move {
                delivery.handle(message).await;
            });
            match self
                .scheduler
                .schedule_message(&job_id, fire_at, callback)
                .await
            {
                Ok(()) => scheduled += 1,
                Err(err) => warn!(job_id, error = %err, "failed to schedule due message"),
            }
        }
        Ok(scheduled)
    }

    async fn heartbeat(&self, healthy: bool) {
        let Some(base) = &self.config.heartbeat_url else {
            return;
        };
        let url = if healthy {
            base.clone()
        } else {
            format!("{base}/fail")
        };
        if let Err(err) = self.http.get(&url).send().await {
            debug!(error = %err, "heartbeat ping failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::application::services::gateway::testing::RecordingGateway;
    use crate::application::services::gateway::ConversationGateway;
    use crate::domain::models::{SnoozeMessage, WorkspaceToken};
    use crate::domain::repositories::WorkspaceTokenStore;
    use crate::infrastructure::repositories::in_memory::{
        InMemoryMessageStore, InMemoryWorkspaceTokenStore,
    };

    struct Fixture {
        messages: Arc<InMemoryMessageStore>,
        scheduler: Arc<JobScheduler>,
        gateway: Arc<RecordingGateway>,
        dispatch: Arc<DispatchLoop>,
    }

    async fn fixture() -> Fixture {
        let messages = InMemoryMessageStore::new();
        let tokens = InMemoryWorkspaceTokenStore::new();
        tokens
            .upsert(WorkspaceToken {
                workspace_id: "w1".to_string(),
                access_token: "sealed".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        let gateway = RecordingGateway::new();
        let delivery = Arc::new(DeliveryHandler::new(
            messages.clone(),
            tokens,
            Arc::clone(&gateway) as Arc<dyn ConversationGateway>,
        ));
        let scheduler = JobScheduler::start().await;
        let dispatch = DispatchLoop::new(
            messages.clone(),
            Arc::clone(&scheduler),
            delivery,
            DispatchConfig {
                interval: Duration::from_secs(6 * 60 * 60),
                heartbeat_url: None,
            },
        );
        Fixture {
            messages,
            scheduler,
            gateway,
            dispatch,
        }
    }

    fn message_at(send_date: chrono::DateTime<Utc>) -> SnoozeMessage {
        SnoozeMessage {
            id: Uuid::new_v4(),
            workspace_id: "w1".to_string(),
            conversation_id: "c1".to_string(),
            admin_id: "a1".to_string(),
            content: "body".to_string(),
            send_date,
            close_conversation: false,
            archived: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_schedules_only_messages_due_within_the_window() {
        let fx = fixture().await;
        let now = Utc::now();
        let soon = message_at(now + chrono::Duration::hours(1));
        let past = message_at(now - chrono::Duration::hours(3));
        let next_week = message_at(now + chrono::Duration::days(7));
        fx.messages
            .insert_messages(&[soon.clone(), past.clone(), next_week])
            .await
            .unwrap();

        let scheduled = fx.dispatch.run_cycle().await.unwrap();
        assert_eq!(scheduled, 2);
        assert_eq!(
            fx.scheduler.job_info(&soon.id.to_string()).await,
            Some(soon.send_date)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fired_jobs_run_the_delivery_chain_and_archive() {
        let fx = fixture().await;
        let past = message_at(Utc::now() - chrono::Duration::hours(3));
        fx.messages.insert_messages(&[past.clone()]).await.unwrap();

        fx.dispatch.run_cycle().await.unwrap();
        // A past send date fires immediately once the timer task runs.
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(fx.messages.get(past.id).await.unwrap().unwrap().archived);
        assert_eq!(fx.gateway.calls(), vec![format!("send:c1:body")]);
        assert_eq!(fx.scheduler.active_job_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rerunning_a_cycle_replaces_rather_than_stacks_jobs() {
        let fx = fixture().await;
        let soon = message_at(Utc::now() + chrono::Duration::hours(2));
        fx.messages.insert_messages(&[soon.clone()]).await.unwrap();

        fx.dispatch.run_cycle().await.unwrap();
        fx.dispatch.run_cycle().await.unwrap();

        assert_eq!(fx.scheduler.active_job_count().await, 1);
    }
}
