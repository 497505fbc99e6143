//! CLI surface for the autoblast binary

pub mod args;
pub mod config;
pub mod error;
pub mod output;

pub use args::Cli;
