//! `normcalc` command-line front end.
//!
//! - [`cli`]: argument definitions
//! - [`config`]: environment configuration
//! - [`commands`]: subcommands producing JSON documents
//! - [`logging`]: tracing subscriber setup

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
