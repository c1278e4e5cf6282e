pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod render;
pub mod session;
pub mod slack;

pub use error::{Result, SlackvError};
