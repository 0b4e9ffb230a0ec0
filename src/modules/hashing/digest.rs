use pbkdf2::pbkdf2;
use sha2::{Digest, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_512};

use super::codec::{combine, FormatError};
use crate::modules::config::policy::{HashAlgorithm, Policy};
use crate::{HmacSha256, PBKDF2_OUTPUT_LEN};

/// Digest `candidate` with `salt` for `iterations` rounds.
///
/// Round one digests `salt ‖ candidate`, every further round digests the
/// previous output. PBKDF2 runs its own `iterations` rounds instead.
pub fn hash(algorithm: HashAlgorithm, candidate: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha256 => iterate::<Sha256>(candidate, salt, iterations),
        HashAlgorithm::Sha384 => iterate::<Sha384>(candidate, salt, iterations),
        HashAlgorithm::Sha512 => iterate::<Sha512>(candidate, salt, iterations),
        HashAlgorithm::Sha3_256 => iterate::<Sha3_256>(candidate, salt, iterations),
        HashAlgorithm::Sha3_512 => iterate::<Sha3_512>(candidate, salt, iterations),
        HashAlgorithm::Pbkdf2Sha256 => {
            let mut key = vec![0u8; PBKDF2_OUTPUT_LEN];
            pbkdf2::<HmacSha256>(candidate, salt, iterations.max(1), &mut key);
            key
        }
    }
}

fn iterate<D: Digest>(candidate: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(salt);
    hasher.update(candidate);
    let mut digest = hasher.finalize();

    for _ in 1..iterations {
        digest = D::digest(&digest);
    }

    digest.to_vec()
}

/// Produce the credential-file form of `password` under `policy`.
///
/// The salt is only used when the policy salts; it is written into the
/// stored form as-is.
pub fn encode_secret(policy: &Policy, password: &str, salt: &str) -> Result<String, FormatError> {
    if !policy.hashing_enabled() {
        return Ok(password.to_string());
    }

    let salt_bytes: &[u8] = if policy.salting_enabled() {
        salt.as_bytes()
    } else {
        &[]
    };
    let digest = hash(
        policy.algorithm(),
        password.as_bytes(),
        salt_bytes,
        policy.iterations(),
    );
    let encoded = policy.encoding().encode(&digest);

    if policy.salting_enabled() {
        combine(salt, &encoded, policy.salt_first(), policy.separator())
    } else {
        Ok(encoded)
    }
}
