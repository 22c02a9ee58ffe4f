//! Backend runtime entry point and public API surface.
//!
//! This crate owns one playback session: it locates and supervises the
//! decoder process, keeps the audio device open across pause/resume, and
//! turns keyboard and OS signals into controller calls. Progress is reported
//! to the frontend as [`radiola_bridge::StatusUpdate`]s.

pub mod config;
pub mod controller;
pub mod coordinator;
pub mod decoder;
pub mod keyboard;
mod runtime;
mod signals;
pub mod stations;

#[cfg(test)]
mod test_support;

pub use crate::runtime::{BackendError, list_output_devices, run};
