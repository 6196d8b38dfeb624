//! Core layer: pure transformations for conditional retrieval.

mod conditional;
mod validation;

pub use conditional::{ACCEPT, IF_MODIFIED_SINCE, IF_NONE_MATCH, conditional_headers};
pub use validation::{StatusClass, classify_status};
