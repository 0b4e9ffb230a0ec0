pub mod authenticator;
pub mod cache;
pub mod verifier;

// Re-export the main types and functions
pub use authenticator::{
    AuthenticationCallback, Authenticator, CallbackPriority, ClientCredentials, ClientIdentity,
};
pub use cache::{CacheConfig, CacheKey, VerificationCache};
pub use verifier::check;
