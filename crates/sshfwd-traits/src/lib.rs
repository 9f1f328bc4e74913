pub mod config;
pub mod forward;
pub mod logging;
pub mod remote;
