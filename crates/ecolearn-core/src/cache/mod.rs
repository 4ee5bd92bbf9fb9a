// ── Payload cache ──
//
// TTL-bounded map of raw endpoint payloads, restored from and saved to a
// pluggable snapshot backend.

mod clock;
mod snapshot;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use snapshot::{FileSnapshot, MemorySnapshot, SnapshotError, SnapshotStore};
pub use store::{CacheEntry, CacheOptions, EntryInfo, TtlCache};

/// Cache key for the full asset repository payload.
pub const KEY_ASSETS: &str = "assets";
/// Cache key for the minimal card list.
pub const KEY_CARDS: &str = "cards";
/// Cache key for the per-category counts.
pub const KEY_COUNTS: &str = "counts";
