pub mod configuration;
pub mod utils;
