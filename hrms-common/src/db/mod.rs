//! Database bootstrap and settings access

pub mod init;
pub mod settings;

pub use init::*;
pub use settings::*;
