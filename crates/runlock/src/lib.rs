//! Runlock - operator CLI for locks and review request status
//!
//! Opens the persistent store named by the configuration and exposes the
//! lock manager and status store operations as subcommands.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use error::{exit_code, Error, Result};
