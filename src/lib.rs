// First, declare the modules folder itself
mod modules;

// Re-export everything from modules for easier access
pub use modules::{auth, config, credentials, hashing, utils};

// Re-export commonly used types
pub use modules::auth::authenticator::{
    AuthenticationCallback, Authenticator, CallbackPriority, ClientCredentials, ClientIdentity,
};
pub use modules::auth::cache::{CacheConfig, CacheKey, VerificationCache};
pub use modules::config::policy::{DigestEncoding, HashAlgorithm, Policy, PolicyError};
pub use modules::config::settings::{ConfigError, Settings};
pub use modules::credentials::reload::{ReloadHandle, ReloadOutcome, Reloader};
pub use modules::credentials::store::{CredentialRecord, CredentialStore, CredentialTable};
pub use modules::hashing::codec::{FormatError, ParsedSecret};

// Constants
pub const DEFAULT_RELOAD_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;
pub const DEFAULT_CACHE_LIFETIME_SECS: u64 = 300;
pub const DEFAULT_HASH_ITERATIONS: u32 = 1_000_000;
pub const PBKDF2_OUTPUT_LEN: usize = 32;

// Type aliases
pub type HmacSha256 = hmac::Hmac<sha2::Sha256>;
