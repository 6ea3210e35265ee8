//! Domain services

pub mod dimension;
pub mod overlay;
pub mod stats;
pub mod validation;

pub use dimension::{format_dimensions, parse_dimensions, Dimensions};
pub use overlay::{label_anchor, ContainFit, ScreenRect, Size};
pub use stats::{average_height, size_categories, summarize, width_distribution};
pub use validation::validate_draft;
