//! Demo wizards for chatforms.
//!
//! Users start a wizard by sending `register`, `login` or `auth`. The
//! [`Dispatcher`] runs at most one wizard per user and channel and replaces
//! each concluded form with a short closing message.

pub mod dispatcher;
pub mod wizards;

pub use dispatcher::{Dispatcher, farewell};
pub use wizards::COMMANDS;
