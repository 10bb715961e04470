pub mod error;
pub mod time;

pub use error::{PromptbatchError, Result};
