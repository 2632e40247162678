pub mod config;
pub mod logs;
pub mod play;
pub mod script;
