//! Outbound calls made by the command hub.
//!
//! - [`ModuleInvoker`]: `POST {module_url}/api/v1/execute` with bounded retry
//! - [`Transport`]: side-channel service calls over RPC, REST, or RPC with
//!   REST fallback, chosen once by [`build_transport`]
//! - [`JsonRpcClient`]: JSON-RPC 2.0 over HTTP to per-service endpoints
//! - [`RestTranslator`]: the translation service client

pub mod module;
pub mod retry;
pub mod rpc;
pub mod service;
pub mod translator;

pub use module::{InvocationPayload, ModuleInvoker};
pub use retry::RetryPolicy;
pub use rpc::JsonRpcClient;
pub use service::{
    build_transport, FallbackTransport, RestTransport, RpcTransport, ServiceCall, Transport,
};
pub use translator::RestTranslator;
