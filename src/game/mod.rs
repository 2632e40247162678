pub mod api;
pub mod bootstrap;
pub mod display;
pub mod keys;
pub mod mirror;
pub mod motion;
pub mod poll;
pub mod reconcile;
