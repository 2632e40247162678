//! Boba.vim client: local movement prediction reconciled against the
//! authoritative game server.

pub mod commands;
pub mod error;
pub mod game;
pub mod util;
