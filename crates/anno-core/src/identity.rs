//! User identity derivation
//!
//! The annotation server never sees the local nickname. What it resolves
//! to a user id is a salted digest of the nickname: deterministic across
//! sessions, opaque to the remote party.

use sha2::{Digest, Sha256};

/// Installation-wide salt mixed into the nickname digest
const USER_SALT: &str = "anno-user:";

/// Derive the opaque user string sent to the server for id resolution
///
/// Pure and deterministic: the same nickname always yields the same
/// string.
pub fn user_string(nickname: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(USER_SALT.as_bytes());
    hasher.update(nickname.as_bytes());
    hex::encode(hasher.finalize())
}
