pub mod codec;
pub mod digest;
pub mod salt;

// Re-export the main types and functions
pub use codec::{combine, split, FormatError, ParsedSecret};
pub use digest::{encode_secret, hash};
pub use salt::{generate_random_salt, generate_salt_string};
