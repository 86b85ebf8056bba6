//! Data models

mod message;
mod migration;

pub use message::*;
pub use migration::*;
