//! Logic modules: translate a finished selection into concrete install actions.
//!
//! # Modules
//!
//! - `resolver`: active file descriptor collection from the wizard state

pub mod resolver;
