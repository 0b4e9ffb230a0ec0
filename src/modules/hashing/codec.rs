//! Splitting and joining of combined hash/salt strings.

use thiserror::Error;

/// Reasons a combined hash/salt string cannot be decomposed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("separator '{0}' not found")]
    MissingSeparator(char),
    #[error("separator occurs {0} times, expected exactly once")]
    MultipleSeparators(usize),
    #[error("hash or salt segment is empty")]
    EmptySegment,
    #[error("payload contains the separator '{0}'")]
    SeparatorInPayload(char),
}

/// Hash and salt recovered from a stored secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSecret {
    pub hash: Vec<u8>,
    pub salt: Vec<u8>,
}

/// Split `combined` into hash and salt on its single `separator`.
///
/// With `salt_first` the text before the separator is the salt, otherwise
/// it is the hash.
pub fn split(combined: &str, salt_first: bool, separator: char) -> Result<ParsedSecret, FormatError> {
    let occurrences = combined.matches(separator).count();
    let (head, tail) = match occurrences {
        0 => return Err(FormatError::MissingSeparator(separator)),
        1 => combined
            .split_once(separator)
            .ok_or(FormatError::MissingSeparator(separator))?,
        n => return Err(FormatError::MultipleSeparators(n)),
    };

    if head.is_empty() || tail.is_empty() {
        return Err(FormatError::EmptySegment);
    }

    let (salt, hash) = if salt_first { (head, tail) } else { (tail, head) };
    Ok(ParsedSecret {
        hash: hash.as_bytes().to_vec(),
        salt: salt.as_bytes().to_vec(),
    })
}

/// Join salt and hash into the stored form understood by [`split`]
pub fn combine(salt: &str, hash: &str, salt_first: bool, separator: char) -> Result<String, FormatError> {
    if salt.is_empty() || hash.is_empty() {
        return Err(FormatError::EmptySegment);
    }
    if salt.contains(separator) || hash.contains(separator) {
        return Err(FormatError::SeparatorInPayload(separator));
    }

    let (head, tail) = if salt_first { (salt, hash) } else { (hash, salt) };
    Ok(format!("{}{}{}", head, separator, tail))
}
