//! Preprocessing between prepared partitions and model matrices
//!
//! - Label normalization (text vocabularies, numeric casts)
//! - Feature column selection
//! - Per-column label encoding with an unknown bucket

pub mod encoder;
pub mod features;
pub mod labels;

pub use encoder::{LabelEncoder, UNKNOWN};
pub use features::{encode_frame, select_features, FeatureSet};
pub use labels::{ensure_binary, normalize_labels};
