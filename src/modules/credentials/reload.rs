//! Periodic and on-demand reloading of settings and credentials.

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::loader::load_credentials;
use super::store::{CredentialStore, CredentialTable};
use crate::modules::auth::cache::VerificationCache;
use crate::modules::config::policy::Policy;
use crate::modules::config::settings::{load_settings, ConfigError, Settings};
use crate::modules::utils::time::format_duration;

/// Settings, policy and credentials read in one pass
#[derive(Debug)]
pub struct LoadedConfiguration {
    pub settings: Settings,
    pub policy: Policy,
    pub table: CredentialTable,
}

impl LoadedConfiguration {
    /// Read the settings file and the credential file it points to.
    /// Nothing is returned unless both parse and the policy is valid.
    pub fn load(settings_path: &Path) -> Result<Self, ConfigError> {
        let settings = load_settings(settings_path)?;
        let policy = settings.policy()?;
        let table = load_credentials(&settings.credentials_file)?;
        Ok(Self {
            settings,
            policy,
            table,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied { users: usize, cache_reset: bool },
    /// Another reload was already running
    Skipped,
}

enum Signal {
    Reload,
    Stop,
}

/// Re-reads configuration into the credential store and cache.
///
/// Only one reload runs at a time; a failed reload leaves the store and
/// cache exactly as they were.
pub struct Reloader {
    settings_path: PathBuf,
    store: Arc<CredentialStore>,
    cache: Arc<VerificationCache>,
    interval: Mutex<Duration>,
    in_flight: Mutex<()>,
}

impl Reloader {
    pub fn new(
        settings_path: impl Into<PathBuf>,
        store: Arc<CredentialStore>,
        cache: Arc<VerificationCache>,
        interval: Duration,
    ) -> Self {
        Self {
            settings_path: settings_path.into(),
            store,
            cache,
            interval: Mutex::new(interval),
            in_flight: Mutex::new(()),
        }
    }

    /// Perform the initial load and build store and cache from it.
    /// Errors here are fatal for the caller since there is no previous state.
    pub fn open(settings_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let settings_path = settings_path.into();
        let loaded = LoadedConfiguration::load(&settings_path)?;
        log_policy(&loaded.policy);

        let interval = loaded.settings.reload_interval();
        let cache = Arc::new(VerificationCache::new(loaded.settings.cache_config()));
        let store = Arc::new(CredentialStore::new(loaded.table, loaded.policy));
        Ok(Self::new(settings_path, store, cache, interval))
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<VerificationCache> {
        &self.cache
    }

    pub fn interval(&self) -> Duration {
        *self.interval.lock()
    }

    /// Reload now, unless a reload is already in progress
    pub fn reload_now(&self) -> Result<ReloadOutcome, ConfigError> {
        let _guard = match self.in_flight.try_lock() {
            Some(guard) => guard,
            None => {
                debug!("Reload already in progress, skipping");
                return Ok(ReloadOutcome::Skipped);
            }
        };

        let loaded = LoadedConfiguration::load(&self.settings_path)?;
        log_policy(&loaded.policy);

        let users = loaded.table.len();
        let cache_config = loaded.settings.cache_config();
        *self.interval.lock() = loaded.settings.reload_interval();

        self.store.reload(loaded.table, loaded.policy);
        let cache_reset = self.cache.reconfigure(cache_config);
        if cache_reset {
            info!(
                "Cache limits changed (max_entries={}, lifetime={}), cache cleared",
                cache_config.max_entries,
                format_duration(cache_config.entry_lifetime)
            );
        }

        info!("Loaded credentials for {} users", users);
        Ok(ReloadOutcome::Applied { users, cache_reset })
    }

    fn tick(&self) {
        if let Err(e) = self.reload_now() {
            match e {
                ConfigError::Policy(_) => error!(
                    "Invalid configuration in {}: {}. Keeping previous configuration.",
                    self.settings_path.display(),
                    e
                ),
                _ => warn!("Reload failed: {}. Keeping previous configuration.", e),
            }
        }

        // Entries nobody looks up again would otherwise stay until evicted
        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
    }

    /// Start the background reload thread
    pub fn spawn(self: Arc<Self>) -> io::Result<ReloadHandle> {
        let (sender, receiver) = mpsc::channel();
        let reloader = Arc::clone(&self);
        let thread = thread::Builder::new()
            .name("credential-reload".to_string())
            .spawn(move || reloader.run(receiver))?;

        info!(
            "Reloading credentials every {}",
            format_duration(self.interval())
        );
        Ok(ReloadHandle {
            sender,
            thread: Some(thread),
        })
    }

    fn run(&self, receiver: Receiver<Signal>) {
        loop {
            match receiver.recv_timeout(self.interval()) {
                Ok(Signal::Reload) | Err(RecvTimeoutError::Timeout) => self.tick(),
                Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Reload thread stopped");
    }
}

fn log_policy(policy: &Policy) {
    debug!("File Authentication Configuration:");
    debug!("hashed: {}", policy.hashing_enabled());
    debug!("salted: {}", policy.salting_enabled());
    debug!("salt first: {}", policy.salt_first());
    debug!("iterations: {}", policy.iterations());
    debug!("algorithm: {}", policy.algorithm());
    debug!("encoding: {}", policy.encoding());
    debug!("separator: {}", policy.separator());
}

/// Controls a running reload thread; dropping it stops the thread
pub struct ReloadHandle {
    sender: Sender<Signal>,
    thread: Option<JoinHandle<()>>,
}

impl ReloadHandle {
    /// Ask for a reload without waiting for the next tick
    pub fn trigger(&self) {
        if self.sender.send(Signal::Reload).is_err() {
            warn!("Reload thread is not running");
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.sender.send(Signal::Stop);
            if thread.join().is_err() {
                error!("Reload thread panicked");
            }
        }
    }
}

impl Drop for ReloadHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
