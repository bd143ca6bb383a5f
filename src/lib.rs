pub mod config;
pub mod display;
pub mod narr;
pub mod store;
