//! Token connector plugins

pub mod fftokens;

pub use fftokens::FfTokens;
