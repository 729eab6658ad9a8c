pub mod engine;
pub mod features;
pub mod history;
pub mod loader;

pub use engine::*;
pub use features::{FeatureEngineer, FeatureRow, FeatureTable, LagAlignment};
pub use history::HistoryIndex;
pub use loader::{LoaderError, RawRecord, TimeSeriesLoader};
