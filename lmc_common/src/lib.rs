//! LMC Common Library
//!
//! Shared definitions for the lab motion controller workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Array sizes and timing defaults
//! - [`hal`] - Hardware seam traits (`PinIo`, `Clock`, `SerialLink`)
//! - [`axis`] - Per-axis configuration record
//! - [`machine`] - Complete machine configuration
//! - [`config`] - Configuration loading and errors
//! - [`error`] - Protocol error codes
//! - [`mask`] - Axis selection mask
//! - [`prelude`] - Common re-exports

pub mod axis;
pub mod config;
pub mod consts;
pub mod error;
pub mod hal;
pub mod machine;
pub mod mask;
pub mod prelude;
