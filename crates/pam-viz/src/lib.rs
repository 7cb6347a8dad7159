//! Layout helpers: seeded force-directed placement for a single partition
//! and the grid used to stitch partition layouts together.

pub mod grid;
pub mod layout;

pub use grid::{Bounds, GridSpec};
pub use layout::{degree_layout, spring_layout, LayoutError, LayoutParams};
