//! Grid hierarchies: contexts, per-level fields and band-splitting
//! filters.

pub mod context;
pub mod field;
pub mod filter;

pub use context::{Level, MultiLevelContext};
pub use field::MultiLevelField;
pub use filter::{lowpass_weight, BandFilters};
