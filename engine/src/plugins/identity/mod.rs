//! Identity plugins

pub mod onchain;

pub use onchain::Onchain;
