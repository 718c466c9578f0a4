pub mod atomic_file;
pub mod config;
pub mod debug_flags;
pub mod hashing;
pub mod normalizations;
pub mod script;
