//! Identifier helpers.
//!
//! Drafts use random UUIDv4 ids generated on first edit. Context ids and
//! batch ids are UUIDv7 so they sort by creation time.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Generate the client-side id for a new draft.
#[inline]
pub fn new_draft_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate an identifier for a page save batch.
pub fn new_batch_id() -> String {
    format!("batch-{}", new_v7().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_is_version_7() {
        assert_eq!(new_v7().get_version_num(), 7);
    }

    #[test]
    fn test_draft_id_is_v4() {
        assert_eq!(new_draft_id().get_version_num(), 4);
    }

    #[test]
    fn test_batch_id_prefix() {
        let id = new_batch_id();
        assert!(id.starts_with("batch-"));
        assert_eq!(id.len(), "batch-".len() + 32);
    }
}
