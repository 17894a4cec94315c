//! KDL configuration parsing for Deckhand.
//!
//! This crate handles parsing of:
//! - Application descriptions (app.kdl)
//! - Platform descriptions (platform.kdl)
//! - Service output interpolation in environment values

pub mod application;
pub mod error;
mod nodes;
pub mod platform;
pub mod variables;

pub use application::{load_application, parse_application};
pub use error::{ConfigError, ConfigResult};
pub use platform::{
    CicdConfig, IngressConfig, PlatformConfig, StorageClasses, load_platform, parse_platform,
};
pub use variables::{ServiceReference, environment_from, interpolate, references};
