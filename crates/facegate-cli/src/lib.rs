//! facegate-cli — command-line front end over the facegate core and store.

pub mod cli;
pub mod commands;
pub mod config;
pub mod output;
