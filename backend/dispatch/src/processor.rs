//! The command processor.
//!
//! [`CommandProcessor::process_event`] validates an inbound event, issues its
//! session, classifies it and runs the matching branch:
//!
//! | message type | branch |
//! |---|---|
//! | `slashCommand` | canonicalised to `!name opts...`, then the prefix-command path |
//! | interactions | `custom_id` parsed into routing metadata, no module call |
//! | stream events | activity/reputation/workflow notifications, acknowledged |
//! | chat (and unknown tags) | notifications, translation, prefix-command detection |
//!
//! The primary path (flood check → community → registry → gates → invoke →
//! store) completes before the result is returned. Everything else is a
//! detached [`TaskPool`] task.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cmdhub_commands::{
    canonicalize_slash, detect_command, is_command, parse_args, parse_interaction,
    CANONICAL_PREFIX,
};
use cmdhub_config::{DispatchConfig, HubConfig};
use cmdhub_core::{
    Cache, CommandOutcome, CommandRegistry, CommunityStore, DispatchResult, Event, EventKind,
    EventPublisher, ExecutedCommand, HubResult, InboundEvent, OutboundEvent, RateLimiter,
    Rejection, Reply, RpcClient, SessionAllocator, TranslationRequest, TranslationResult,
    Translator, TriggerFilter, WorkflowStore,
};
use cmdhub_infra::{
    spawn_sweeper, MemoryCache, SlidingWindowLimiter, StaticDirectory, UuidSessionAllocator,
};
use cmdhub_logging::log_preview;
use cmdhub_routing::{CommunityResolver, EnablementGate};
use cmdhub_transport::{
    build_transport, InvocationPayload, JsonRpcClient, ModuleInvoker, RestTranslator, RetryPolicy,
    Transport,
};
use futures::FutureExt;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::notifier::{stream_details, EventContext, Notifiers};
use crate::responses::ResponseStore;
use crate::tasks::TaskPool;

const LOG_PREVIEW_CHARS: usize = 80;

pub struct CommandProcessor {
    registry: Arc<dyn CommandRegistry>,
    limiter: Arc<dyn RateLimiter>,
    sessions: Arc<dyn SessionAllocator>,
    communities: Arc<dyn CommunityStore>,
    translator: Option<Arc<dyn Translator>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    resolver: Arc<CommunityResolver>,
    enablement: EnablementGate,
    invoker: ModuleInvoker,
    responses: ResponseStore,
    notifiers: Notifiers,
    pool: TaskPool,
    settings: DispatchConfig,
    sweeper: Option<JoinHandle<()>>,
}

impl Drop for CommandProcessor {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

impl CommandProcessor {
    pub fn builder(config: &HubConfig) -> ProcessorBuilder {
        ProcessorBuilder::new(config)
    }

    /// Process one inbound event. Always returns a structured result.
    pub async fn process_event(&self, raw: InboundEvent) -> DispatchResult {
        let mut event = match Event::from_inbound(raw) {
            Ok(event) => event,
            Err(rejection) => {
                info!(error = %rejection, "Rejected inbound event");
                return DispatchResult::rejected(None, &rejection);
            }
        };

        let session_id = self.sessions.allocate(&event.entity_id, &event.user_id);
        let span = info_span!(
            "event",
            session_id = %session_id,
            entity_id = %event.entity_id,
            message_type = %event.message_type,
        );

        let routed = AssertUnwindSafe(self.route(&mut event, &session_id))
            .catch_unwind()
            .instrument(span)
            .await;

        match routed {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(session_id = %session_id, error = %e, "Event processing failed");
                DispatchResult::failed(Some(session_id), e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(session_id = %session_id, panic = %message, "Event processing panicked");
                DispatchResult::failed(Some(session_id), format!("internal error: {message}"))
            }
        }
    }

    /// Run a command through the gates and invoke its module.
    ///
    /// Gate order: community, registry, module enablement, command enablement,
    /// cooldown. Refusals are `Ok(Err(Rejection))`; collaborator faults are `Err`.
    pub async fn execute_command(
        &self,
        command: &str,
        entity_id: &str,
        user_id: &str,
        message: &str,
        session_id: &str,
    ) -> HubResult<CommandOutcome> {
        let Some(community_id) = self.resolver.resolve(entity_id).await? else {
            info!(entity_id, command, "No community mapped for entity");
            return Ok(Err(Rejection::CommunityNotFound));
        };

        let Some(info) = self.registry.get_command(command, &community_id).await? else {
            info!(community_id = %community_id, command, "Unknown command");
            return Ok(Err(Rejection::UnknownCommand(command.to_string())));
        };

        if !self.enablement.is_enabled(&community_id, &info.module_name).await {
            info!(community_id = %community_id, module = %info.module_name, "Module disabled");
            return Ok(Err(Rejection::ModuleDisabled));
        }
        if !info.is_enabled {
            info!(community_id = %community_id, command, "Command disabled");
            return Ok(Err(Rejection::CommandDisabled));
        }

        if info.cooldown_seconds > 0 {
            let key = format!("cooldown:{user_id}:{command}");
            let window = Duration::from_secs(info.cooldown_seconds);
            if !self.allow(&key, 1, window).await {
                debug!(user_id, command, cooldown = info.cooldown_seconds, "Command on cooldown");
                return Ok(Err(Rejection::Cooldown(info.cooldown_seconds)));
            }
        }

        let payload = InvocationPayload {
            command: command.to_string(),
            args: parse_args(message),
            user_id: user_id.to_string(),
            entity_id: entity_id.to_string(),
            community_id: community_id.clone(),
            session_id: session_id.to_string(),
            message: message.to_string(),
        };

        let Some(response) = self.invoker.invoke(&info.module_url, &payload).await else {
            warn!(module = %info.module_name, command, "Module did not respond");
            return Ok(Err(Rejection::ModuleUnresponsive));
        };

        self.responses.store(session_id, &response).await;
        info!(module = %info.module_name, command, "Command executed");
        Ok(Ok(ExecutedCommand {
            command: command.to_string(),
            module: info.module_name,
            response,
        }))
    }

    /// Response stored for `session_id`, if any.
    pub async fn get_response(&self, session_id: &str) -> Option<Value> {
        self.responses.get(session_id).await
    }

    /// Wait for detached work to finish. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        self.pool.wait_idle(timeout).await
    }

    pub fn pending_tasks(&self) -> usize {
        self.pool.pending()
    }

    async fn route(&self, event: &mut Event, session_id: &str) -> HubResult<DispatchResult> {
        let ctx = EventContext::new(event, session_id);
        match event.kind.clone() {
            EventKind::SlashCommand { options } => {
                let text = canonicalize_slash(&event.message, &options);
                debug!(canonical = %text, "Canonicalised slash command");
                self.run_command_message(event, &ctx, &text, &[CANONICAL_PREFIX])
                    .await
            }
            EventKind::Interaction { custom_id } => {
                let route = parse_interaction(&custom_id);
                info!(module = %route.module, action = %route.action, "Interaction routed");
                Ok(DispatchResult::ok(session_id, Reply::Interaction(route)))
            }
            EventKind::Stream => {
                self.handle_stream_event(event, &ctx);
                Ok(DispatchResult::ok(
                    session_id,
                    Reply::Acknowledged {
                        event_type: event.message_type,
                    },
                ))
            }
            EventKind::ChatMessage => self.handle_chat_message(event, &ctx).await,
        }
    }

    fn handle_stream_event(&self, event: &Event, ctx: &EventContext) {
        let details = stream_details(event);
        self.notifiers
            .record_activity(ctx, event.message_type, details.clone());
        if let Some(name) = event.message_type.reputation_event() {
            self.notifiers
                .record_reputation(ctx, name, event.metadata.amount);
        }
        self.notifiers.trigger_workflows(
            ctx,
            TriggerFilter::MessageType {
                entity_id: event.entity_id.clone(),
                message_type: event.message_type,
            },
            json!({ "details": details }),
        );
        info!(event_type = %event.message_type, "Stream event recorded");
    }

    async fn handle_chat_message(
        &self,
        event: &mut Event,
        ctx: &EventContext,
    ) -> HubResult<DispatchResult> {
        self.notifiers.record_activity(
            ctx,
            event.message_type,
            json!({ "length": event.message.chars().count() }),
        );
        if let Some(name) = event.message_type.reputation_event() {
            self.notifiers.record_reputation(ctx, name, None);
        }

        let translated = self.maybe_translate(event, ctx).await;
        if is_command(&event.message, &self.settings.command_prefixes) {
            let text = event.message.clone();
            return self
                .run_command_message(event, ctx, &text, &self.settings.command_prefixes)
                .await;
        }

        self.notifiers.trigger_workflows(
            ctx,
            TriggerFilter::MessageType {
                entity_id: event.entity_id.clone(),
                message_type: event.message_type,
            },
            json!({ "message": event.message }),
        );
        debug!(
            message = %log_preview(&event.message, LOG_PREVIEW_CHARS),
            translated,
            "Chat message handled"
        );
        Ok(DispatchResult::ok(&ctx.session_id, Reply::Message { translated }))
    }

    /// Flood check, then [`Self::execute_command`], then success fan-out.
    async fn run_command_message(
        &self,
        event: &Event,
        ctx: &EventContext,
        text: &str,
        prefixes: &[char],
    ) -> HubResult<DispatchResult> {
        let Some(command) = detect_command(text, prefixes) else {
            return Ok(DispatchResult::ok(&ctx.session_id, Reply::Message { translated: false }));
        };
        info!(
            command = %command,
            user_id = %event.user_id,
            message = %log_preview(text, LOG_PREVIEW_CHARS),
            "Command received"
        );

        let flood_key = format!("{}:{}", event.user_id, command);
        if !self
            .allow(&flood_key, self.settings.flood_limit, self.settings.flood_window())
            .await
        {
            info!(command = %command, user_id = %event.user_id, "Flood limit exceeded");
            return Ok(DispatchResult::rejected(
                Some(ctx.session_id.clone()),
                &Rejection::RateLimited,
            ));
        }

        let outcome = self
            .execute_command(&command, &event.entity_id, &event.user_id, text, &ctx.session_id)
            .await?;
        if let Ok(executed) = &outcome {
            self.after_success(ctx, executed);
        }
        Ok(DispatchResult::from_outcome(ctx.session_id.clone(), outcome))
    }

    fn after_success(&self, ctx: &EventContext, executed: &ExecutedCommand) {
        self.notifiers.trigger_workflows(
            ctx,
            TriggerFilter::Command {
                entity_id: ctx.entity_id.clone(),
                command: executed.command.clone(),
            },
            json!({
                "command": executed.command,
                "module": executed.module,
                "response": executed.response,
            }),
        );

        let Some(publisher) = &self.publisher else {
            return;
        };
        let publisher = Arc::clone(publisher);
        let resolver = Arc::clone(&self.resolver);
        let ctx = ctx.clone();
        let executed = executed.clone();
        self.pool.spawn("publish", async move {
            let community_id = resolver.resolve(&ctx.entity_id).await?.unwrap_or_default();
            publisher
                .publish(OutboundEvent {
                    session_id: ctx.session_id,
                    entity_id: ctx.entity_id,
                    community_id,
                    platform: ctx.platform,
                    channel_id: ctx.channel_id,
                    command: executed.command,
                    module: executed.module,
                    response: executed.response,
                    timestamp: Utc::now(),
                })
                .await
        });
    }

    /// Translate a chat message in place when its community has translation on.
    ///
    /// Any failure leaves the event untouched.
    async fn maybe_translate(&self, event: &mut Event, ctx: &EventContext) -> bool {
        let Some(translator) = &self.translator else {
            return false;
        };
        if event.message.trim().is_empty() {
            return false;
        }

        let community_id = match self.resolver.resolve(&event.entity_id).await {
            Ok(Some(community_id)) => community_id,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Community lookup for translation failed");
                return false;
            }
        };
        let config = match self.communities.translation_config(&community_id).await {
            Ok(Some(config)) if config.enabled => config,
            Ok(_) => return false,
            Err(e) => {
                warn!(community_id = %community_id, error = %e, "Translation config lookup failed");
                return false;
            }
        };

        let request = TranslationRequest {
            text: event.message.clone(),
            target_lang: config.target_lang.clone(),
            community_id,
            config,
            platform: event.platform.clone(),
            channel_id: event.channel_id.clone(),
        };
        let result = match translator.translate(&request).await {
            Ok(Some(result)) => result,
            Ok(None) => return false,
            Err(e) => {
                warn!(community_id = %request.community_id, error = %e, "Translation failed");
                return false;
            }
        };
        if !accept_translation(&request, &result) {
            debug!(detected = %result.detected_lang, "Translation not applied");
            return false;
        }

        let original = event.message.clone();
        event.apply_translation(result.clone());
        self.notifiers.push_caption(ctx, &original, &result);
        info!(
            detected = %result.detected_lang,
            target = %result.target_lang,
            provider = %result.provider,
            "Message translated"
        );
        true
    }

    /// Limiter check that fails open.
    async fn allow(&self, key: &str, limit: u32, window: Duration) -> bool {
        match self.limiter.check(key, limit, window).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(key, error = %e, "Rate limiter unavailable; allowing");
                true
            }
        }
    }
}

fn accept_translation(request: &TranslationRequest, result: &TranslationResult) -> bool {
    let text = result.translated_text.trim();
    if text.is_empty() || text == request.text.trim() {
        return false;
    }
    if result.detected_lang.eq_ignore_ascii_case(&request.target_lang) {
        return false;
    }
    request
        .config
        .min_confidence
        .map_or(true, |min| result.confidence >= min)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Wires a [`CommandProcessor`]. Collaborators left unset get the in-process
/// implementations, with the directory seeded from config.
pub struct ProcessorBuilder {
    config: HubConfig,
    registry: Option<Arc<dyn CommandRegistry>>,
    communities: Option<Arc<dyn CommunityStore>>,
    workflows: Option<Arc<dyn WorkflowStore>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    cache: Option<Arc<dyn Cache>>,
    sessions: Option<Arc<dyn SessionAllocator>>,
    translator: Option<Arc<dyn Translator>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    transport: Option<Arc<dyn Transport>>,
    rpc: Option<Arc<dyn RpcClient>>,
    http: Option<reqwest::Client>,
}

impl ProcessorBuilder {
    fn new(config: &HubConfig) -> Self {
        Self {
            config: config.clone(),
            registry: None,
            communities: None,
            workflows: None,
            limiter: None,
            cache: None,
            sessions: None,
            translator: None,
            publisher: None,
            transport: None,
            rpc: None,
            http: None,
        }
    }

    pub fn registry(mut self, registry: Arc<dyn CommandRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn community_store(mut self, store: Arc<dyn CommunityStore>) -> Self {
        self.communities = Some(store);
        self
    }

    pub fn workflow_store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.workflows = Some(store);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn sessions(mut self, sessions: Arc<dyn SessionAllocator>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Override the notifier transport. Otherwise it is chosen from config.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn rpc_client(mut self, rpc: Arc<dyn RpcClient>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> CommandProcessor {
        let config = self.config;
        let dispatch = config.dispatch.clone();
        let notifiers_cfg = &config.notifiers;

        let directory = Arc::new(StaticDirectory::from_config(&config.directory));
        let registry = self.registry.unwrap_or_else(|| directory.clone());
        let communities = self.communities.unwrap_or_else(|| directory.clone());
        let workflows = self.workflows.unwrap_or_else(|| directory.clone());

        let http = self.http.unwrap_or_default();
        let (cache, local_cache): (Arc<dyn Cache>, _) = match self.cache {
            Some(cache) => (cache, None),
            None => {
                let cache = MemoryCache::new();
                (Arc::new(cache.clone()), Some(cache))
            }
        };
        let (limiter, local_limiter): (Arc<dyn RateLimiter>, _) = match self.limiter {
            Some(limiter) => (limiter, None),
            None => {
                let limiter = SlidingWindowLimiter::new();
                (Arc::new(limiter.clone()), Some(limiter))
            }
        };
        let sweeper = start_sweeper(local_cache, local_limiter, dispatch.sweep_interval());
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(UuidSessionAllocator));

        let resolver = Arc::new(CommunityResolver::new(
            cache.clone(),
            communities.clone(),
            dispatch.community_ttl(),
        ));
        let enablement =
            EnablementGate::new(cache.clone(), communities.clone(), dispatch.enablement_ttl());
        let invoker = ModuleInvoker::new(
            http.clone(),
            dispatch.module_timeout(),
            RetryPolicy::new(dispatch.module_max_attempts, dispatch.backoff_base()),
        );

        let rpc = self.rpc.or_else(|| {
            JsonRpcClient::from_config(http.clone(), notifiers_cfg)
                .map(|client| Arc::new(client) as Arc<dyn RpcClient>)
        });
        let transport = self
            .transport
            .unwrap_or_else(|| build_transport(notifiers_cfg, http.clone(), rpc));
        let translator = self.translator.or_else(|| {
            notifiers_cfg.translation_url.as_deref().map(|url| {
                Arc::new(RestTranslator::new(http.clone(), url, notifiers_cfg.rest_timeout()))
                    as Arc<dyn Translator>
            })
        });

        let pool = TaskPool::new(config.tasks.max_concurrent, config.tasks.max_pending);
        let notifiers = Notifiers::new(transport, resolver.clone(), workflows, pool.clone());
        let responses = ResponseStore::new(cache, dispatch.response_ttl());

        info!(
            transport = notifiers.transport_name(),
            translation = translator.is_some(),
            publisher = self.publisher.is_some(),
            "Command processor ready"
        );

        CommandProcessor {
            registry,
            limiter,
            sessions,
            communities,
            translator,
            publisher: self.publisher,
            resolver,
            enablement,
            invoker,
            responses,
            notifiers,
            pool,
            settings: dispatch,
            sweeper,
        }
    }
}

/// Sweep the in-process stores the builder created, if there are any.
fn start_sweeper(
    cache: Option<MemoryCache>,
    limiter: Option<SlidingWindowLimiter>,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if cache.is_none() && limiter.is_none() {
        return None;
    }
    match tokio::runtime::Handle::try_current() {
        Ok(_) => Some(spawn_sweeper(cache, limiter, every)),
        Err(_) => {
            warn!("No Tokio runtime; in-process cache and limiter will not be swept");
            None
        }
    }
}
