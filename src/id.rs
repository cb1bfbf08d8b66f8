//! ID generation utilities for taskqueue

use uuid::Uuid;

/// Generate a unique task ID
///
/// Format: hyphenated UUIDv4, e.g. `67e55044-10b1-426f-9247-bb680e5fe0c8`
pub fn generate_task_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_task_id_format() {
        let id = generate_task_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert!(parts.iter().all(|p| p.chars().all(|c| c.is_ascii_hexdigit())));
    }

    #[test]
    fn test_generate_task_id_uniqueness() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_task_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
