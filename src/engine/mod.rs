pub mod components;
pub mod config;
pub mod error;
pub mod loaders;
pub mod rendering;
pub mod utils;

// Re-export all commonly used items for easy access
pub use components::*;
pub use config::*;
pub use error::*;
