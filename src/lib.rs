#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod cache;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod resources;
pub mod scroll;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
