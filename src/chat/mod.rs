//! Terminal chat front end.
//!
//! This module provides the pieces the `ragchat` binary is built from:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing and help text
//!
//! The binary drives a [`SessionController`](crate::SessionController) with
//! them and renders through a [`Renderer`].

mod commands;
mod config;

pub use crate::render::{NullRenderer, PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, DEFAULT_SERVER_URL, DEFAULT_SOCKET_PATH};
