//! Random identifiers
//!
//! Group identifiers are short opaque tokens. Uniqueness is
//! best-effort, which is plenty at the table sizes involved; nothing
//! here is cryptographic.

use rand::distributions::Alphanumeric;
use rand::Rng;

const ID_LEN: usize = 9;

/// Fresh group identifier: 9 alphanumeric characters.
pub(crate) fn new_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// Uniform integer in the inclusive range `[min, max]`.
pub(crate) fn random_int(min: usize, max: usize) -> usize {
    debug_assert!(min <= max, "empty range");
    rand::thread_rng().gen_range(min..=max)
}
