// Session ids are generated app-side as UUIDv7 so that ordering by id
// follows creation order even when two rows share a `created_at`.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Generate a new UUIDv4 (fully random), used for access-token `jti`s.
pub fn uuidv4() -> Uuid {
    Uuid::new_v4()
}
