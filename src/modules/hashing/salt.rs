use rand::Rng;

/// Number of random bytes in a generated salt
pub const SALT_LENGTH: usize = 16;

/// Function to generate random salt bytes
pub fn generate_random_salt() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..SALT_LENGTH).map(|_| rng.gen()).collect()
}

/// Random salt rendered as hex, safe to embed next to any non-hex separator
pub fn generate_salt_string() -> String {
    hex::encode(generate_random_salt())
}
