//! Unveil HTTP - remote collaborators over reqwest
//!
//! [`HttpBackend`] implements the availability check, the people search
//! backend and the profile store against one JSON service.

#![warn(unreachable_pub)]

pub mod client;
mod wire;

pub use client::{ClientError, HttpBackend};
