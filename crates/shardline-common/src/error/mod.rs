//! Error taxonomy

mod category;

pub use category::{Categorized, ErrorCategory};
