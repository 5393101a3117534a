pub mod agent;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod store;
pub mod tool;
