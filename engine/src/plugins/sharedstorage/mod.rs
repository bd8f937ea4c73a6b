//! Shared storage plugins

pub mod filesystem;
pub mod ipfs;

pub use filesystem::Filesystem;
pub use ipfs::Ipfs;
