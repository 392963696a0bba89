//! Data preparation: CSV I/O, synthetic rows, splitting, sampling, text vectorizing

pub mod loader;
pub mod prep;
pub mod sampler;
pub mod split;
pub mod synthetic;
pub mod text;

pub use loader::{load_csv, save_csv};
pub use prep::{prepare_named_dataset, prepare_toy_dataset, PreparedSplit};
pub use sampler::balanced_sample;
pub use split::{stratified_split, SplitIndices};
pub use synthetic::ToyGenerator;
pub use text::{clean_text, TfidfVectorizer, TextTokenizer};
