//! In-process implementations of the command hub's collaborator traits.
//!
//! Everything here is process-local: a TTL byte cache, a sliding-window
//! limiter, the session allocator, a config-seeded directory, and a broadcast
//! bus for outbound events. Deployments that share state across replicas
//! swap these for networked implementations of the same traits.

pub mod cache;
pub mod directory;
pub mod publisher;
pub mod rate_limiter;
pub mod session;
pub mod sweeper;

pub use cache::MemoryCache;
pub use directory::StaticDirectory;
pub use publisher::BroadcastPublisher;
pub use rate_limiter::SlidingWindowLimiter;
pub use session::UuidSessionAllocator;
pub use sweeper::spawn_sweeper;
