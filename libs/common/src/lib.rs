//! Shared infrastructure for the deposition recipe services

pub mod logging;
pub mod shutdown;

pub use logging::{init_with_config, LogConfig};
pub use shutdown::{cancel_on_shutdown, wait_for_shutdown};
