//! Credential resolution for authenticated retrieval.
//!
//! A [`CredentialStore`] is an explicit object owned (via `Arc`) by each
//! handle, keyed by authority. Handles consult it through a
//! [`CredentialSession`], which memoizes the outcome so the store is hit at
//! most once per handle.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;

use tracing::warn;
use url::Url;

use crate::config::{PASSWORD_ENV_VAR, USERNAME_ENV_VAR};

/// A username/password pair for HTTP Basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The credential key for a URL: `scheme://host[:port]`.
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

/// Source of credentials, keyed by authority.
pub trait CredentialStore: fmt::Debug + Send + Sync {
    fn lookup(&self, authority: &str) -> Option<Credentials>;

    /// Force re-authentication: drop anything stale and re-acquire.
    fn refresh(&self, authority: &str) -> Option<Credentials> {
        self.lookup(authority)
    }
}

/// Credentials from the process environment; the default store.
///
/// Both `URLSTASH_USERNAME` and `URLSTASH_PASSWORD` must be set. The
/// authority is ignored, so one environment pair serves every host.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialStore for EnvCredentials {
    fn lookup(&self, _authority: &str) -> Option<Credentials> {
        let username = env::var(USERNAME_ENV_VAR).ok().filter(|u| !u.is_empty())?;
        let password = env::var(PASSWORD_ENV_VAR).ok()?;
        Some(Credentials::new(username, password))
    }
}

/// Fixed in-memory credentials, for programmatic use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, authority: impl Into<String>, credentials: Credentials) {
        self.entries.insert(authority.into(), credentials);
    }

    pub fn with(mut self, authority: impl Into<String>, credentials: Credentials) -> Self {
        self.insert(authority, credentials);
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn lookup(&self, authority: &str) -> Option<Credentials> {
        self.entries.get(authority).cloned()
    }
}

/// Per-handle memoization of credential resolution.
///
/// Resolution runs lazily, on the first escalation, and its outcome sticks
/// for the handle's lifetime. A negative outcome is memoized too, so a
/// store without credentials is not re-queried on every read.
#[derive(Debug, Clone)]
pub struct CredentialSession {
    store: Arc<dyn CredentialStore>,
    resolved: Option<Option<Credentials>>,
}

impl CredentialSession {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            resolved: None,
        }
    }

    /// Session pre-seeded with known credentials, e.g. from URL userinfo.
    pub fn seeded(store: Arc<dyn CredentialStore>, credentials: Credentials) -> Self {
        Self {
            store,
            resolved: Some(Some(credentials)),
        }
    }

    pub fn resolve(&mut self, authority: &str) -> Option<Credentials> {
        if let Some(outcome) = &self.resolved {
            return outcome.clone();
        }
        let outcome = self.store.lookup(authority);
        if outcome.is_none() {
            warn!(authority, "no credentials available");
        }
        self.resolved = Some(outcome.clone());
        outcome
    }

    /// Drop the memoized outcome and re-acquire through the store's
    /// refresh path.
    pub fn force(&mut self, authority: &str) -> Option<Credentials> {
        let outcome = self.store.refresh(authority);
        self.resolved = Some(outcome.clone());
        outcome
    }
}
