pub mod completion;
pub mod types;
