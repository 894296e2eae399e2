//! Public identifier generation for stores and review sessions.

use rand::Rng;

/// Random suffix length for public ids.
pub const PUBLIC_ID_SUFFIX_LENGTH: usize = 12;

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(PUBLIC_ID_SUFFIX_LENGTH)
        .map(char::from)
        .collect()
}

/// `store_` followed by 12 random alphanumeric characters.
pub fn generate_store_public_id() -> String {
    format!("store_{}", random_suffix())
}

/// `sess_` followed by 12 random alphanumeric characters.
pub fn generate_session_public_id() -> String {
    format!("sess_{}", random_suffix())
}
