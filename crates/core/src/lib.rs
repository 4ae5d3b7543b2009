//! Moderation and trust engine for warden.

pub mod services;

pub use services::*;
