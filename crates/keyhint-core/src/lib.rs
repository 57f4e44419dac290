pub mod config;
pub mod format;
pub mod ipc;
pub mod layout;
pub mod mapping;
pub mod surface;
