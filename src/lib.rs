pub mod bridge;
pub mod config;
pub mod document;
pub mod ipc;
pub mod start_page;
