//! The processing pipeline: an ordered list of transform and filter
//! actions applied to a splat table.

pub mod actions;
pub mod process;
pub mod transform;
pub mod visibility;

pub use actions::{Action, Comparator};
pub use process::{process, split_environment};
pub use transform::transform;
pub use visibility::sort_by_visibility;
