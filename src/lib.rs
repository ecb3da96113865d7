#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::missing_crate_level_docs)]
#![doc = include_str!("../README.md")]

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod plugin;
pub mod record;
pub mod tracker;
