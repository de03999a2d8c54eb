//! UUID v7 utilities for time-ordered identifiers.
//!
//! Alert and session identifiers use UUIDv7 (RFC 9562), which embeds a
//! millisecond-precision timestamp in the high bits and therefore sorts
//! in creation order.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use vigil_core::uuid_utils::new_v7;
///
/// let id = new_v7();
/// // IDs generated later will be lexicographically greater
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Check if a UUID is version 7.
#[inline]
pub fn is_v7(uuid: &Uuid) -> bool {
    uuid.get_version_num() == 7
}
