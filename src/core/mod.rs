// This module groups the infrastructure shared by lowering and encoding: the error type every
// fallible operation returns, the configuration knobs of a compilation unit, and the
// arena-owning compilation session that methods allocate their instruction streams in and that
// collects lowering statistics.

//! Core qpuc infrastructure.
//!
//! # Key Components
//!
//! ## Session Management (`session`)
//! - Arena-based allocation of instruction streams using `bumpalo`
//! - Lowering statistics
//!
//! ## Errors (`error`)
//! - [`CompileError`] tagged with the [`CompilationStep`] it aborts
//!
//! ## Configuration (`config`)
//! - Defaults for the VideoCore IV, overridable from the environment

pub mod config;
pub mod error;
pub mod session;

pub use config::Configuration;
pub use error::{CompilationStep, CompileError, CompileResult};
pub use session::{CompilationSession, LoweringStats};
