//! Data exchange plugins

pub mod ffdx;

pub use ffdx::Ffdx;
