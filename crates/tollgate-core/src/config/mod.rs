#[cfg(feature = "json")]
pub mod json;
#[cfg(feature = "toml")]
pub mod toml;

mod format;
mod types;

pub use format::Format;
pub use types::*;
