use log::warn;
use std::fs;
use std::path::Path;

use super::store::CredentialTable;
use crate::modules::config::settings::ConfigError;
use crate::modules::utils::logging::format_sensitive;

/// Parse a properties-style credential listing.
///
/// One `username=secret` pair per line; `:` also works as delimiter when it
/// comes before any `=`. Blank lines and lines starting with `#` or `!` are
/// skipped. Leading whitespace is ignored, but trailing whitespace belongs
/// to the secret. If a username repeats, the last line wins.
pub fn parse_credentials(text: &str) -> Result<CredentialTable, ConfigError> {
    let mut table = CredentialTable::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let delimiter = line.find(|c: char| c == '=' || c == ':').ok_or_else(|| {
            ConfigError::Credentials {
                line: line_number,
                reason: "expected username=secret".to_string(),
            }
        })?;

        let username = line[..delimiter].trim();
        let secret = line[delimiter + 1..].trim_start();
        if username.is_empty() {
            return Err(ConfigError::Credentials {
                line: line_number,
                reason: "empty username".to_string(),
            });
        }

        if table
            .insert(username.to_string(), secret.to_string())
            .is_some()
        {
            warn!(
                "Duplicate credentials for user {} at line {}, keeping the later entry",
                format_sensitive(username),
                line_number
            );
        }
    }

    Ok(table)
}

/// Read and parse the credential file at `path`
pub fn load_credentials(path: &Path) -> Result<CredentialTable, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_credentials(&text)
}
