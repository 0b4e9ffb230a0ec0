use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use base64::{engine::general_purpose::STANDARD as base64, Engine as _};

use crate::DEFAULT_HASH_ITERATIONS;

/// Errors raised while building a policy from configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("unsupported hashing algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("hashing iterations must be at least 1, got {0}")]
    InvalidIterations(u32),
    #[error("separator '{separator}' collides with the {encoding} digest alphabet")]
    AmbiguousSeparator {
        separator: char,
        encoding: DigestEncoding,
    },
}

/// Digest algorithms a stored secret may be hashed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_512,
    Pbkdf2Sha256,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
            HashAlgorithm::Sha3_256 => "SHA3-256",
            HashAlgorithm::Sha3_512 => "SHA3-512",
            HashAlgorithm::Pbkdf2Sha256 => "PBKDF2-SHA256",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = PolicyError;

    /// Identifiers are matched case-insensitively with `-` and `_` ignored,
    /// so `SHA-512`, `sha512` and `SHA_512` all name the same digest.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            "SHA3256" => Ok(HashAlgorithm::Sha3_256),
            "SHA3512" => Ok(HashAlgorithm::Sha3_512),
            "PBKDF2SHA256" | "PBKDF2WITHHMACSHA256" => Ok(HashAlgorithm::Pbkdf2Sha256),
            _ => Err(PolicyError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Text encoding of digests in the credential file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestEncoding {
    #[default]
    Base64,
    Hex,
}

impl DigestEncoding {
    pub fn encode(&self, digest: &[u8]) -> String {
        match self {
            DigestEncoding::Base64 => base64.encode(digest),
            DigestEncoding::Hex => hex::encode(digest),
        }
    }

    /// Decode a stored digest; `None` when the text is not valid for this encoding
    pub fn decode(&self, text: &str) -> Option<Vec<u8>> {
        match self {
            DigestEncoding::Base64 => base64.decode(text).ok(),
            DigestEncoding::Hex => hex::decode(text).ok(),
        }
    }

    /// Whether `c` can appear inside an encoded digest
    pub fn alphabet_contains(&self, c: char) -> bool {
        match self {
            DigestEncoding::Base64 => c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='),
            DigestEncoding::Hex => c.is_ascii_hexdigit(),
        }
    }
}

impl fmt::Display for DigestEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestEncoding::Base64 => f.write_str("base64"),
            DigestEncoding::Hex => f.write_str("hex"),
        }
    }
}

/// Immutable snapshot of the hashing and salting configuration.
///
/// Only [`PolicyBuilder::build`] creates one, so every `Policy` in circulation
/// has a supported algorithm, at least one iteration and an unambiguous
/// separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    hashing_enabled: bool,
    algorithm: HashAlgorithm,
    iterations: u32,
    encoding: DigestEncoding,
    salting_enabled: bool,
    salt_first: bool,
    separator: char,
}

impl Policy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    /// Policy comparing stored secrets as plaintext
    pub fn plaintext() -> Self {
        Self {
            hashing_enabled: false,
            ..Self::default()
        }
    }

    pub fn hashing_enabled(&self) -> bool {
        self.hashing_enabled
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn encoding(&self) -> DigestEncoding {
        self.encoding
    }

    /// Salting only applies when hashing is enabled
    pub fn salting_enabled(&self) -> bool {
        self.hashing_enabled && self.salting_enabled
    }

    pub fn salt_first(&self) -> bool {
        self.salt_first
    }

    pub fn separator(&self) -> char {
        self.separator
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            hashing_enabled: true,
            algorithm: HashAlgorithm::Sha512,
            iterations: DEFAULT_HASH_ITERATIONS,
            encoding: DigestEncoding::Base64,
            salting_enabled: true,
            salt_first: true,
            separator: '$',
        }
    }
}

/// Validating builder for [`Policy`]
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    hashing_enabled: bool,
    algorithm: String,
    iterations: u32,
    encoding: DigestEncoding,
    salting_enabled: bool,
    salt_first: bool,
    separator: char,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        let defaults = Policy::default();
        Self {
            hashing_enabled: defaults.hashing_enabled,
            algorithm: defaults.algorithm.name().to_string(),
            iterations: defaults.iterations,
            encoding: defaults.encoding,
            salting_enabled: defaults.salting_enabled,
            salt_first: defaults.salt_first,
            separator: defaults.separator,
        }
    }

    pub fn hashing(mut self, enabled: bool) -> Self {
        self.hashing_enabled = enabled;
        self
    }

    pub fn algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn encoding(mut self, encoding: DigestEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn salting(mut self, enabled: bool) -> Self {
        self.salting_enabled = enabled;
        self
    }

    pub fn salt_first(mut self, salt_first: bool) -> Self {
        self.salt_first = salt_first;
        self
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn build(self) -> Result<Policy, PolicyError> {
        let algorithm: HashAlgorithm = self.algorithm.parse()?;

        if self.iterations == 0 {
            return Err(PolicyError::InvalidIterations(self.iterations));
        }

        if self.hashing_enabled
            && self.salting_enabled
            && self.encoding.alphabet_contains(self.separator)
        {
            return Err(PolicyError::AmbiguousSeparator {
                separator: self.separator,
                encoding: self.encoding,
            });
        }

        Ok(Policy {
            hashing_enabled: self.hashing_enabled,
            algorithm,
            iterations: self.iterations,
            encoding: self.encoding,
            salting_enabled: self.salting_enabled,
            salt_first: self.salt_first,
            separator: self.separator,
        })
    }
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
