pub mod loader;
pub mod reload;
pub mod store;

// Re-export the main types and functions
pub use loader::{load_credentials, parse_credentials};
pub use reload::{ReloadHandle, ReloadOutcome, Reloader};
pub use store::{CredentialRecord, CredentialStore, CredentialTable, Snapshot};
