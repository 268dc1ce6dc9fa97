pub mod alignment;
pub mod audio;
pub mod config;
pub mod corpus;
pub mod error;
pub mod features;
pub mod store;
pub mod text;
pub mod types;
