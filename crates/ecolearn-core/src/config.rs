// ── Runtime sync configuration ──
//
// These types describe where the asset API lives and how the cache and
// view layers are tuned. They never touch disk: the CLI (or any other
// embedder) constructs a `SyncConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::fetch::RetryPolicy;

/// TLS verification strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Skip verification (self-signed classroom servers).
    DangerAcceptInvalid,
}

/// Configuration for one asset-sync session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the admin API (e.g., `http://localhost:5000`).
    pub api_url: Url,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout, enforced by the HTTP transport.
    pub timeout: Duration,
    /// How long a cached payload stays valid.
    pub cache_ttl: Duration,
    /// Quiet period before a burst of cache writes is persisted.
    pub persist_debounce: Duration,
    /// Gallery units appended per chunk during a full render.
    pub chunk_size: usize,
    /// Where the durable cache snapshot lives. `None` = memory only.
    pub snapshot_path: Option<PathBuf>,
    /// Maximum snapshot size in bytes. `None` = unlimited.
    pub snapshot_quota: Option<usize>,
    /// Retry policy for transient fetch failures.
    pub retry: RetryPolicy,
}

pub const DEFAULT_API_URL: &str = "http://localhost:5000/";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_CHUNK_SIZE: usize = 10;

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.parse().expect("default API URL is valid"),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            cache_ttl: DEFAULT_CACHE_TTL,
            persist_debounce: DEFAULT_PERSIST_DEBOUNCE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            snapshot_path: None,
            snapshot_quota: None,
            retry: RetryPolicy::default(),
        }
    }
}
