//! Correlation id generation
//!
//! Generated ids are UUID v4 strings, unique within the process lifetime,
//! so caller-supplied numeric or string ids can never collide with them.

use mprow_core::Id;
use uuid::Uuid;

/// Generate a fresh request id.
pub(crate) fn generate() -> Id {
    Id::Str(Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_unique_strings() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let Id::Str(id) = generate() else {
                panic!("generated id must be a string");
            };
            assert!(seen.insert(id));
        }
    }
}
