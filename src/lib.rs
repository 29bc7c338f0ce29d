pub mod aggregate;
pub mod analyzer;
pub mod error;
pub mod extract;
pub mod format;
pub mod logging;
pub mod models;
pub mod report;
pub mod sequence;
