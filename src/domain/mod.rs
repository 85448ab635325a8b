pub mod fleet;
pub mod mock;
pub mod types;
