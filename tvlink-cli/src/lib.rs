//! # tvlink-cli: command-line remote
//!
//! Sends key presses to a legacy TV from the terminal. Connection and
//! timing settings come from a TOML file; the `paired` flag is written
//! back after the first successful pairing so later runs can tell a
//! switched-off TV from one that was never set up.

pub mod config;
