//! Building datasets from location metadata

pub mod builder;
pub mod kinds;
pub mod names;
pub mod reorder;

pub use builder::{build_dataset, location_metadata, resolve_config, DatasetBuilder};
pub use kinds::{IndexImpl, LayoutVersion, NodeTableImpl};
pub use reorder::ReorderChoice;
