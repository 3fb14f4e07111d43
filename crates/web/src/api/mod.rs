//! REST API endpoint modules.

pub mod mappings;
pub mod status;
