//! # ForgeBot Telegram Bot
//!
//! A Telegram bot front-end for an AI text/image generation backend,
//! with per-user model preferences in a local SQLite database and a
//! four-epoch quiz about the history of Russian ironmaking.

pub mod bot;
pub mod db;
pub mod generation;
pub mod quiz;
