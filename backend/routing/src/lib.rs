//! Cache-fronted lookups that place an event in its community and decide
//! whether a module may run there.

pub mod community;
pub mod enablement;

pub use community::CommunityResolver;
pub use enablement::EnablementGate;
