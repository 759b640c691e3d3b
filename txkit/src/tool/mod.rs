pub mod context_wait;
pub mod error;

// Re-export commonly used types
pub use context_wait::{handle_error_with_context, panic_message};
pub use error::*;
