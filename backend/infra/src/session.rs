use cmdhub_core::SessionAllocator;
use uuid::Uuid;

/// Issues `sess_<32 hex>` ids. Ids are unique per event and carry no
/// entity or user information.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSessionAllocator;

impl SessionAllocator for UuidSessionAllocator {
    fn allocate(&self, _entity_id: &str, _user_id: &str) -> String {
        format!("sess_{}", Uuid::new_v4().simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_prefixed_and_unique() {
        let alloc = UuidSessionAllocator;
        let a = alloc.allocate("disc-1", "user-1");
        let b = alloc.allocate("disc-1", "user-1");
        assert!(a.starts_with("sess_"));
        assert_eq!(a.len(), 5 + 32);
        assert_ne!(a, b);
    }
}
