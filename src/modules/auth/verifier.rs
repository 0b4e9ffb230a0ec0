use log::debug;
use subtle::ConstantTimeEq;

use crate::modules::config::policy::Policy;
use crate::modules::hashing::{codec, digest};

/// Check a presented password against the secret stored for the user.
///
/// Any stored value that cannot be interpreted under `policy` denies the
/// attempt instead of raising an error.
pub fn check(candidate: &str, stored: &str, policy: &Policy) -> bool {
    if !policy.hashing_enabled() {
        return constant_time_eq(candidate.as_bytes(), stored.as_bytes());
    }

    if !policy.salting_enabled() {
        let expected = match policy.encoding().decode(stored) {
            Some(bytes) => bytes,
            None => {
                debug!("Stored digest is not valid {}", policy.encoding());
                return false;
            }
        };
        let computed = digest::hash(
            policy.algorithm(),
            candidate.as_bytes(),
            &[],
            policy.iterations(),
        );
        return constant_time_eq(&computed, &expected);
    }

    let parsed = match codec::split(stored, policy.salt_first(), policy.separator()) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Stored hash/salt could not be split: {}", e);
            return false;
        }
    };

    let expected = match std::str::from_utf8(&parsed.hash)
        .ok()
        .and_then(|text| policy.encoding().decode(text))
    {
        Some(bytes) => bytes,
        None => {
            debug!("Stored digest is not valid {}", policy.encoding());
            return false;
        }
    };
    let computed = digest::hash(
        policy.algorithm(),
        candidate.as_bytes(),
        &parsed.salt,
        policy.iterations(),
    );
    constant_time_eq(&computed, &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
