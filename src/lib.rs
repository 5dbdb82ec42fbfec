pub mod api;
pub mod auth;
pub mod browser;
pub mod config;
pub mod episodes;
pub mod error;
pub mod har;
pub mod picker;
pub mod player;
pub mod utils;

// re-export the types most callers need
pub use crate::config::Config;
pub use crate::episodes::{extract, extract_bytes, Episode};
pub use crate::error::{CtlError, Result};
