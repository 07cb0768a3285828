pub mod endpoints;
pub mod lib;
pub mod settings;

// Re-export the main items for easier access
pub use endpoints::{detect_request, identify_provider, is_supported_endpoint, supported_endpoints, NormalizedRequest};
pub use lib::*;
pub use settings::ConversionSettings;
