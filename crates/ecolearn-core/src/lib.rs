// ecolearn-core: Read-through cache and view synchronization between
// ecolearn-api and consumers (CLI).

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod fetch;
pub mod model;
pub mod projection;
pub mod source;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{
    Clock, FileSnapshot, ManualClock, MemorySnapshot, SnapshotStore, SystemClock, TtlCache,
};
pub use config::{SyncConfig, TlsVerification};
pub use controller::{Controller, ControllerBuilder, Lifecycle, LoadOutcome, SubscriptionId};
pub use error::CoreError;
pub use event::{Event, Mutation};
pub use fetch::{FetchDeduplicator, RetryPolicy};
pub use model::{AssetCounts, Catalog, Category, Group, Item, ItemId};
pub use source::RemoteSource;
pub use view::{
    GalleryFilter, GallerySnapshot, Placeholder, RenderUnit, SurfaceState, ViewSynchronizer,
};

// Re-exported so embedders can build uploads without depending on the
// API crate directly.
pub use ecolearn_api::CardUpload;
