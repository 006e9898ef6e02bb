pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod header;
pub mod locate;
pub mod merge;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod resolve;

pub use config::Config;
pub use pipeline::{Pipeline, RunOutput};
