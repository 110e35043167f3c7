pub mod config;
pub mod context;
pub mod fetch;
pub mod images;
pub mod list;
