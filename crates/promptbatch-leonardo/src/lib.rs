pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod port;

pub use client::{GeneratedImage, GenerationRecord, GenerationStatus, LeonardoClient};
pub use config::LeonardoConfig;
pub use error::{LeonardoError, Result};
pub use port::LeonardoPort;
