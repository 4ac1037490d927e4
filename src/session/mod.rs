pub mod context;
pub mod types;

pub use context::SessionContext;
pub use types::{PhotoMetadata, ScrollCycleResult};
