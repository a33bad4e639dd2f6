mod auth_level;
mod config;
mod identity;
mod log;

pub use auth_level::*;
pub use config::*;
pub use identity::*;
pub use log::*;
