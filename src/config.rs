//! Handle construction options and environment surface.
//!
//! Options are plain data with documented defaults; nothing here touches the
//! network or the filesystem except [`shared_cache_root`], which reads one
//! environment variable.
//!
//! # Environment Variables
//!
//! - `URLSTASH_CACHE` - shared cache root, always first in root order
//! - `URLSTASH_USERNAME` / `URLSTASH_PASSWORD` - default credential source

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::credentials::CredentialStore;

pub const CACHE_ENV_VAR: &str = "URLSTASH_CACHE";
pub const USERNAME_ENV_VAR: &str = "URLSTASH_USERNAME";
pub const PASSWORD_ENV_VAR: &str = "URLSTASH_PASSWORD";

/// When retrieval may send credentials.
///
/// Every policy starts with an anonymous attempt; the policy decides what
/// happens when that attempt fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CredentialPolicy {
    /// Never send credentials; an anonymous failure is final.
    None,
    /// Escalate to an authenticated attempt when anonymous access fails.
    #[default]
    Optional,
    /// Same escalation, but the resource is expected to need credentials.
    Required,
}

/// Construction options for a resource handle.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Options {
    /// Explicit output file. When set, both cache paths point at this file
    /// and caching is forced on, bypassing root resolution.
    pub ofile: Option<PathBuf>,
    /// Materialize bodies as raw bytes instead of UTF-8 text.
    pub binary: bool,
    /// Enable the local cache.
    pub cache: bool,
    /// Ordered candidate cache roots, tried after the shared root from
    /// `URLSTASH_CACHE`. Defaults to the current directory.
    pub cache_roots: Vec<PathBuf>,
    pub credential_policy: CredentialPolicy,
    /// Secret store consulted on escalation (loaded from the process
    /// environment when absent, never from serialized options).
    #[serde(skip)]
    pub credentials: Option<Arc<dyn CredentialStore>>,
    /// Debug-level diagnostics; consumed by the CLI when it configures the
    /// subscriber. The library itself only emits through `tracing`.
    pub verbose: bool,
    /// Log destination, also consumed by the CLI subscriber setup.
    pub log: Option<PathBuf>,
}

fn default_cache_roots() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ofile: None,
            binary: false,
            cache: false,
            cache_roots: default_cache_roots(),
            credential_policy: CredentialPolicy::default(),
            credentials: None,
            verbose: false,
            log: None,
        }
    }
}

impl Options {
    /// Options for a cached read under the given roots.
    pub fn cached(roots: Vec<PathBuf>) -> Self {
        Self {
            cache: true,
            cache_roots: roots,
            ..Self::default()
        }
    }
}

/// Shared cache root from the environment, if any.
///
/// An empty value counts as unset so `URLSTASH_CACHE=""` cannot inject the
/// current directory as a root.
pub fn shared_cache_root() -> Option<PathBuf> {
    match env::var(CACHE_ENV_VAR) {
        Ok(root) if !root.is_empty() => Some(PathBuf::from(root)),
        _ => None,
    }
}
