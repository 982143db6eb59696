//! # Tint Common Library
//!
//! Shared code for the Tint colorization service:
//! - Error type
//! - Configuration loading and resolution
//! - Colorization parameters and override merging
//! - Progress event types

pub mod config;
pub mod error;
pub mod events;
pub mod params;

pub use error::{Error, Result};
pub use events::{ProgressEvent, ProgressStage};
pub use params::{ColorizationParameters, ParameterOverrides, ParameterWarning};
