//! CLI command implementations.

mod config;
mod doctor;
mod download;
mod formats;

pub use config::run_config;
pub use doctor::run_doctor;
pub use download::run_download;
pub use formats::run_formats;
