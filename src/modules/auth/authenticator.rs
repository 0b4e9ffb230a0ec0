use log::{debug, trace};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use super::cache::{CacheKey, VerificationCache};
use super::verifier;
use crate::modules::config::policy::Policy;
use crate::modules::credentials::store::CredentialStore;
use crate::modules::utils::logging::{format_sensitive, log_auth_event};

/// Ordering hint for a dispatcher that consults several authenticators.
/// `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallbackPriority {
    High,
    Medium,
    Low,
}

/// Who is connecting, as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientIdentity {
    pub remote_address: Option<IpAddr>,
    pub client_id: String,
}

impl ClientIdentity {
    pub fn new(remote_address: Option<IpAddr>, client_id: impl Into<String>) -> Self {
        Self {
            remote_address,
            client_id: client_id.into(),
        }
    }

    /// Remote address, or loopback when the transport did not supply one
    pub fn address(&self) -> IpAddr {
        self.remote_address
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

/// Everything a connecting client presents
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientCredentials {
    pub identity: ClientIdentity,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Common interface of authenticators an external dispatcher can order
pub trait AuthenticationCallback: Send + Sync {
    fn check_credentials(&self, credentials: &ClientCredentials) -> bool;

    fn priority(&self) -> CallbackPriority;
}

/// Authenticates clients against the credential store, memoizing outcomes
pub struct Authenticator {
    store: Arc<CredentialStore>,
    cache: Arc<VerificationCache>,
}

impl Authenticator {
    pub fn new(store: Arc<CredentialStore>, cache: Arc<VerificationCache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<VerificationCache> {
        &self.cache
    }

    /// Decide whether the client may connect. Every failure path is `false`.
    pub fn authenticate(
        &self,
        identity: &ClientIdentity,
        username: Option<&str>,
        secret: Option<&str>,
    ) -> bool {
        trace!(
            "Checking credentials for client with IP {}, client identifier '{}' and username '{}'",
            identity.address(),
            identity.client_id,
            username.map(format_sensitive).unwrap_or_else(|| "NONE".to_string())
        );

        let username = match username {
            Some(username) => username,
            None => {
                debug!(
                    "No username is present for client with IP {} and client identifier '{}'. Denying access.",
                    identity.address(),
                    identity.client_id
                );
                return false;
            }
        };

        let secret = match secret {
            Some(secret) => secret,
            None => {
                debug!(
                    "No password is present for client with IP {}, client identifier '{}' and username '{}'. Denying access.",
                    identity.address(),
                    identity.client_id,
                    format_sensitive(username)
                );
                return false;
            }
        };

        let key = CacheKey::fingerprint(username, secret);
        if let Some(granted) = self.cache.lookup(&key) {
            trace!(
                "Cached decision for username '{}': {}",
                format_sensitive(username),
                granted
            );
            return granted;
        }

        // Record and policy come from the same snapshot
        let snapshot = self.store.snapshot();
        let granted = match snapshot.table.get(username) {
            Some(record) => {
                let granted = verifier::check(secret, &record.stored_secret, &snapshot.policy);
                debug!(
                    "{} password validation for client with IP {}, client identifier '{}' and username '{}' was {}.",
                    validation_mode(&snapshot.policy),
                    identity.address(),
                    identity.client_id,
                    format_sensitive(username),
                    if granted { "successful" } else { "not successful" }
                );
                granted
            }
            None => {
                debug!(
                    "No password is present for username '{}' in the credentials file. Denying access.",
                    format_sensitive(username)
                );
                false
            }
        };

        self.cache.insert(key, granted);
        log_auth_event(
            validation_mode(&snapshot.policy),
            &identity.address().to_string(),
            username,
            granted,
        );
        granted
    }
}

impl AuthenticationCallback for Authenticator {
    fn check_credentials(&self, credentials: &ClientCredentials) -> bool {
        self.authenticate(
            &credentials.identity,
            credentials.username.as_deref(),
            credentials.password.as_deref(),
        )
    }

    fn priority(&self) -> CallbackPriority {
        CallbackPriority::High
    }
}

fn validation_mode(policy: &Policy) -> &'static str {
    if !policy.hashing_enabled() {
        "Plaintext"
    } else if !policy.salting_enabled() {
        "Hashed"
    } else {
        "Hashed and salted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::cache::CacheConfig;
    use crate::modules::credentials::loader::parse_credentials;
    use crate::modules::credentials::store::CredentialTable;
    use crate::modules::hashing::digest::encode_secret;
    use std::time::Duration;

    fn authenticator(table: CredentialTable, policy: Policy) -> Authenticator {
        Authenticator::new(
            Arc::new(CredentialStore::new(table, policy)),
            Arc::new(VerificationCache::new(CacheConfig::default())),
        )
    }

    fn client() -> ClientIdentity {
        ClientIdentity::new(Some("192.0.2.10".parse().unwrap()), "client-1")
    }

    #[test]
    fn test_plaintext_end_to_end() {
        let table: CredentialTable = [("alice", "secret123")].into_iter().collect();
        let auth = authenticator(table, Policy::plaintext());

        assert!(auth.authenticate(&client(), Some("alice"), Some("secret123")));
        assert!(!auth.authenticate(&client(), Some("alice"), Some("wrong")));
    }

    #[test]
    fn test_trailing_space_in_stored_password() {
        let table = parse_credentials("alice=pw \n").unwrap();
        let auth = authenticator(table, Policy::plaintext());

        assert!(auth.authenticate(&client(), Some("alice"), Some("pw ")));
        assert!(!auth.authenticate(&client(), Some("alice"), Some("pw")));
    }

    #[test]
    fn test_hashed_end_to_end() {
        let policy = Policy::builder()
            .algorithm("SHA-256")
            .iterations(1)
            .salting(false)
            .build()
            .unwrap();
        let table: CredentialTable = [("bob", "9S+9MrKzuG/4jvbEkGKChfSCrxXdyylUH5S89Saj9sc=")]
            .into_iter()
            .collect();
        let auth = authenticator(table, policy);

        assert!(auth.authenticate(&client(), Some("bob"), Some("hunter2")));
        assert!(!auth.authenticate(&client(), Some("bob"), Some("hunter3")));
    }

    #[test]
    fn test_salted_end_to_end() {
        let policy = Policy::builder()
            .algorithm("SHA-512")
            .iterations(100)
            .salt_first(true)
            .separator('$')
            .build()
            .unwrap();
        let stored = encode_secret(&policy, "pw", "4f1c2a").unwrap();
        assert!(stored.starts_with("4f1c2a$"));
        let table: CredentialTable = [("carol", stored)].into_iter().collect();
        let auth = authenticator(table, policy);

        assert!(auth.authenticate(&client(), Some("carol"), Some("pw")));
        for candidate in ["", "PW", "pw ", "4f1c2a", "pwpw"] {
            assert!(!auth.authenticate(&client(), Some("carol"), Some(candidate)));
        }
    }

    #[test]
    fn test_missing_fields_deny() {
        let table: CredentialTable = [("x", "x")].into_iter().collect();
        let auth = authenticator(table, Policy::plaintext());

        assert!(!auth.authenticate(&client(), None, Some("x")));
        assert!(!auth.authenticate(&client(), Some("x"), None));
        assert!(!auth.authenticate(&ClientIdentity::default(), None, None));
        // Nothing was cached for incomplete requests
        assert!(auth.cache().is_empty());
    }

    #[test]
    fn test_cache_hit_skips_store() {
        let table: CredentialTable = [("alice", "secret123")].into_iter().collect();
        let auth = authenticator(table, Policy::plaintext());
        assert!(auth.authenticate(&client(), Some("alice"), Some("secret123")));

        // Remove alice; the cached positive result still answers
        auth.store().reload(CredentialTable::new(), Policy::plaintext());
        assert!(auth.authenticate(&client(), Some("alice"), Some("secret123")));

        // A different password is a different key and goes to the store
        assert!(!auth.authenticate(&client(), Some("alice"), Some("other")));
    }

    #[test]
    fn test_unknown_user_is_cached_negative() {
        let auth = authenticator(CredentialTable::new(), Policy::plaintext());
        assert!(!auth.authenticate(&client(), Some("mallory"), Some("guess")));
        assert_eq!(
            auth.cache().lookup(&CacheKey::fingerprint("mallory", "guess")),
            Some(false)
        );

        // Adding the user does not help until the cached denial is gone
        let table: CredentialTable = [("mallory", "guess")].into_iter().collect();
        auth.store().reload(table, Policy::plaintext());
        assert!(!auth.authenticate(&client(), Some("mallory"), Some("guess")));

        auth.cache().clear();
        assert!(auth.authenticate(&client(), Some("mallory"), Some("guess")));
    }

    #[test]
    fn test_expired_decision_is_recomputed() {
        let table: CredentialTable = [("alice", "secret123")].into_iter().collect();
        let auth = Authenticator::new(
            Arc::new(CredentialStore::new(table, Policy::plaintext())),
            Arc::new(VerificationCache::new(CacheConfig {
                max_entries: 10,
                entry_lifetime: Duration::ZERO,
            })),
        );
        assert!(auth.authenticate(&client(), Some("alice"), Some("secret123")));

        auth.store().reload(CredentialTable::new(), Policy::plaintext());
        std::thread::sleep(Duration::from_millis(5));
        assert!(!auth.authenticate(&client(), Some("alice"), Some("secret123")));
    }

    #[test]
    fn test_malformed_record_only_affects_its_user() {
        let policy = Policy::builder()
            .algorithm("SHA-256")
            .iterations(1)
            .build()
            .unwrap();
        let good = encode_secret(&policy, "pw", "abcd").unwrap();
        let table: CredentialTable = [("good", good.as_str()), ("broken", "no separator")]
            .into_iter()
            .collect();
        let auth = authenticator(table, policy);

        assert!(!auth.authenticate(&client(), Some("broken"), Some("pw")));
        assert!(auth.authenticate(&client(), Some("good"), Some("pw")));
    }

    #[test]
    fn test_callback_interface() {
        struct DenyAll;
        impl AuthenticationCallback for DenyAll {
            fn check_credentials(&self, _credentials: &ClientCredentials) -> bool {
                false
            }
            fn priority(&self) -> CallbackPriority {
                CallbackPriority::Low
            }
        }

        let table: CredentialTable = [("alice", "secret123")].into_iter().collect();
        let mut callbacks: Vec<Box<dyn AuthenticationCallback>> = vec![
            Box::new(DenyAll),
            Box::new(authenticator(table, Policy::plaintext())),
        ];
        callbacks.sort_by_key(|callback| callback.priority());
        assert_eq!(callbacks[0].priority(), CallbackPriority::High);

        let credentials = ClientCredentials {
            identity: client(),
            username: Some("alice".to_string()),
            password: Some("secret123".to_string()),
        };
        assert!(callbacks[0].check_credentials(&credentials));
        assert!(!callbacks[1].check_credentials(&credentials));
    }

    #[test]
    fn test_identity_defaults_to_loopback() {
        assert_eq!(
            ClientIdentity::default().address(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(client().address().to_string(), "192.0.2.10");
    }
}
