//! Fire-and-forget side channels: activity, reputation, workflows, captions.
//!
//! Every notification runs as a detached [`TaskPool`] task that resolves the
//! community itself and sends through the configured [`Transport`]. Failures
//! stay inside the task.

use std::sync::Arc;

use chrono::Utc;
use cmdhub_core::{Event, MessageType, TranslationResult, TriggerFilter, WorkflowStore};
use cmdhub_routing::CommunityResolver;
use cmdhub_transport::{ServiceCall, Transport};
use serde_json::{json, Value};
use tracing::debug;

use crate::tasks::TaskPool;

/// The event fields notifications carry, detached from the event itself.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub session_id: String,
    pub entity_id: String,
    pub user_id: String,
    pub username: String,
    pub platform: String,
    pub channel_id: String,
}

impl EventContext {
    pub fn new(event: &Event, session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            entity_id: event.entity_id.clone(),
            user_id: event.user_id.clone(),
            username: event.username.clone(),
            platform: event.platform.clone(),
            channel_id: event.channel_id.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Notifiers {
    transport: Arc<dyn Transport>,
    resolver: Arc<CommunityResolver>,
    workflows: Arc<dyn WorkflowStore>,
    pool: TaskPool,
}

impl Notifiers {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<CommunityResolver>,
        workflows: Arc<dyn WorkflowStore>,
        pool: TaskPool,
    ) -> Self {
        Self {
            transport,
            resolver,
            workflows,
            pool,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn record_activity(&self, ctx: &EventContext, event_type: MessageType, details: Value) {
        let ctx = ctx.clone();
        self.send_for_community("activity", ctx.clone(), move |community_id| {
            ServiceCall::activity(json!({
                "community_id": community_id,
                "entity_id": ctx.entity_id,
                "platform": ctx.platform,
                "platform_user_id": ctx.user_id,
                "username": ctx.username,
                "channel_id": ctx.channel_id,
                "event_type": event_type,
                "session_id": ctx.session_id,
                "details": details,
                "timestamp": Utc::now(),
            }))
        });
    }

    pub fn record_reputation(&self, ctx: &EventContext, event_name: &'static str, amount: Option<u64>) {
        let ctx = ctx.clone();
        self.send_for_community("reputation", ctx.clone(), move |community_id| {
            ServiceCall::reputation(json!({
                "community_id": community_id,
                "platform": ctx.platform,
                "platform_user_id": ctx.user_id,
                "username": ctx.username,
                "event_type": event_name,
                "amount": amount,
                "session_id": ctx.session_id,
            }))
        });
    }

    pub fn push_caption(&self, ctx: &EventContext, original: &str, result: &TranslationResult) {
        let ctx = ctx.clone();
        let original = original.to_string();
        let result = result.clone();
        self.send_for_community("caption", ctx.clone(), move |community_id| {
            ServiceCall::caption(json!({
                "community_id": community_id,
                "platform": ctx.platform,
                "channel_id": ctx.channel_id,
                "platform_user_id": ctx.user_id,
                "username": ctx.username,
                "original_text": original,
                "translated_text": result.translated_text,
                "detected_lang": result.detected_lang,
                "target_lang": result.target_lang,
                "confidence": result.confidence,
                "provider": result.provider,
            }))
        });
    }

    /// Look up matching workflows, then trigger each in its own task.
    pub fn trigger_workflows(&self, ctx: &EventContext, filter: TriggerFilter, context: Value) {
        let this = self.clone();
        let ctx = ctx.clone();
        self.pool.spawn("workflow-lookup", async move {
            let Some(community_id) = this.resolver.resolve(&ctx.entity_id).await? else {
                debug!(entity_id = %ctx.entity_id, "No community; skipping workflows");
                return Ok(());
            };
            let matched = this.workflows.matching_workflows(&filter).await?;
            if matched.is_empty() {
                return Ok(());
            }
            debug!(count = matched.len(), entity_id = %ctx.entity_id, "Triggering workflows");

            let (trigger_type, trigger_value) = filter.trigger();
            for workflow in matched {
                let call = ServiceCall::workflow_trigger(
                    &workflow.workflow_id,
                    json!({
                        "workflow_id": workflow.workflow_id,
                        "community_id": community_id,
                        "entity_id": ctx.entity_id,
                        "trigger_type": trigger_type,
                        "trigger_value": trigger_value,
                        "trigger_config": workflow.trigger_config,
                        "platform": ctx.platform,
                        "channel_id": ctx.channel_id,
                        "platform_user_id": ctx.user_id,
                        "username": ctx.username,
                        "session_id": ctx.session_id,
                        "context": context,
                    }),
                );
                let transport = Arc::clone(&this.transport);
                this.pool.spawn("workflow", async move {
                    transport.send(&call).await.map(|_| ())
                });
            }
            Ok(())
        });
    }

    /// Spawn a task that resolves the community, then sends `build(community_id)`.
    fn send_for_community<B>(&self, name: &'static str, ctx: EventContext, build: B)
    where
        B: FnOnce(String) -> ServiceCall + Send + 'static,
    {
        let resolver = Arc::clone(&self.resolver);
        let transport = Arc::clone(&self.transport);
        self.pool.spawn(name, async move {
            let Some(community_id) = resolver.resolve(&ctx.entity_id).await? else {
                debug!(entity_id = %ctx.entity_id, task = name, "No community; skipping notification");
                return Ok(());
            };
            transport.send(&build(community_id)).await.map(|_| ())
        });
    }
}

/// Fields of a stream event worth forwarding as activity details.
pub fn stream_details(event: &Event) -> Value {
    let mut details = serde_json::Map::new();
    if let Some(amount) = event.metadata.amount {
        details.insert("amount".into(), amount.into());
    }
    if let Some(tier) = &event.metadata.tier {
        details.insert("tier".into(), tier.clone().into());
    }
    if let Some(viewers) = event.metadata.viewers {
        details.insert("viewers".into(), viewers.into());
    }
    Value::Object(details)
}
