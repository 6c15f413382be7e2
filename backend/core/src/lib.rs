pub mod error;
pub mod event;
pub mod outcome;
pub mod traits;
pub mod types;

pub use error::{HubError, HubResult};
pub use event::{Event, EventKind, InboundEvent, MessageType, Metadata, SlashOption};
pub use outcome::{CommandOutcome, DispatchResult, ExecutedCommand, InteractionRoute, Rejection, Reply};
pub use traits::{
    Cache, CommandRegistry, CommunityStore, EventPublisher, RateLimiter, RpcClient,
    SessionAllocator, Translator, WorkflowStore,
};
pub use types::{
    CommandInfo, OutboundEvent, ServiceKind, TranslationConfig, TranslationRequest,
    TranslationResult, TriggerFilter, WorkflowTrigger,
};
