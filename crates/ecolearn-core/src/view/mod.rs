// ── Rendered views ──
//
// The gallery and counter surfaces kept in step with the catalog.

mod filter;
mod surface;
mod synchronizer;

pub use filter::GalleryFilter;
pub use surface::{
    GallerySnapshot, PatchOutcome, Placeholder, RenderOutcome, RenderUnit, SurfaceState,
};
pub use synchronizer::ViewSynchronizer;
