use env_logger::{Builder, Env, WriteStyle};
use log::{info, warn, LevelFilter};

/// Initialize the logging system on stderr.
///
/// `default_level` applies unless `RUST_LOG` is set.
pub fn initialize_logging(default_level: LevelFilter) -> Result<(), log::SetLoggerError> {
    Builder::from_env(Env::default().default_filter_or(default_level.to_string()))
        // Enable timestamps
        .format_timestamp_secs()
        // Enable module path in logs
        .format_module_path(true)
        .write_style(WriteStyle::Auto)
        .try_init()?;

    info!("Logging system initialized");
    Ok(())
}

/// Helper function to mask usernames and other sensitive text for logging
pub fn format_sensitive(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Structured log line for one authentication decision
pub fn log_auth_event(mode: &str, address: &str, username: &str, success: bool) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    if success {
        info!(
            "Auth event: mode={}, address={}, user={}, success=true, timestamp={}",
            mode,
            address,
            format_sensitive(username),
            timestamp
        );
    } else {
        warn!(
            "Auth event: mode={}, address={}, user={}, success=false, timestamp={}",
            mode,
            address,
            format_sensitive(username),
            timestamp
        );
    }
}
