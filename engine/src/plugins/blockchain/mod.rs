//! Blockchain connector plugins

pub mod ethereum;
pub mod fabric;

pub use ethereum::Ethereum;
pub use fabric::Fabric;
