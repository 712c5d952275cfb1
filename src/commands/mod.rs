pub mod config;
pub mod labels;
pub mod store_scan;
pub mod utils;
pub mod wms;

#[cfg(test)]
#[path = "../commands_test.rs"]
mod commands_test;
