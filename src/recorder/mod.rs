//! Recording system module
//!
//! This module implements the asset-recording core:
//! - MovieRecorder state machine and its dedicated writing thread
//! - RecorderDelegate callback contract
//! - RecorderStatus lifecycle ordering

pub mod delegate;
pub mod movie;
pub mod status;

pub use delegate::{EventSender, RecorderDelegate, RecorderError, RecorderEvent, RecorderResult};
pub use movie::MovieRecorder;
pub use status::RecorderStatus;
