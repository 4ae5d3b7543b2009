//! Common utilities and shared types for warden.
//!
//! This crate provides foundational components used across all warden crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Time**: An injectable [`Clock`] so expiry can be evaluated against
//!   simulated time in tests
//!
//! # Example
//!
//! ```no_run
//! use warden_common::{AppResult, Clock, Config, IdGenerator, SystemClock};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let now = SystemClock.now();
//!     println!("{} listening on {} at {now}", id_gen.generate(), config.server.port);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
