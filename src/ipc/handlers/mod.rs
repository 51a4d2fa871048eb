pub mod bridge;
pub mod document;
pub mod start_page;
