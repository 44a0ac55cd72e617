#![forbid(unsafe_code)]

pub mod browser;
pub mod chrome;
pub mod cli;
pub mod config;
pub mod details;
pub mod error;
pub mod formats;
pub mod listing;
pub mod logging;
pub mod pipeline;
pub mod ranking;
pub mod store;
