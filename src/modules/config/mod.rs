pub mod policy;
pub mod settings;

// Re-export the main types and functions
pub use policy::{DigestEncoding, HashAlgorithm, Policy, PolicyBuilder, PolicyError};
pub use settings::{load_settings, ConfigError, Settings};
