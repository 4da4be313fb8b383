// This module provides arena-based session management for qpuc using the bumpalo crate.
// CompilationSession owns the borrow of the arena every method's instruction stream is
// allocated in, the Configuration of the compilation unit, and lowering statistics. Methods
// created through a session share its arena lifetime, so instructions appended during lowering
// are moved into arena storage exactly once and released together when the arena is dropped.
// LoweringStats tracks how many functions and lowering requests were processed, how many
// canonical instructions they expanded into, a per-request-kind breakdown, how many calls were
// recognised as intrinsics, and the largest function produced. Statistics are interior-mutable
// so the lowering driver can record them through a shared reference to the session.

//! Arena-based compilation session management.
//!
//! All methods of a compilation unit allocate their instruction streams in the
//! session's arena and therefore share the session lifetime.

use super::config::Configuration;
use bumpalo::Bump;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// Arena-based compilation session.
pub struct CompilationSession<'arena> {
    /// Arena allocator for instruction streams.
    arena: &'arena Bump,

    /// Configuration of this compilation unit.
    config: Configuration,

    /// Session statistics for debugging.
    stats: RefCell<LoweringStats>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new session with the default configuration.
    pub fn new(arena: &'arena Bump) -> Self {
        Self::with_config(arena, Configuration::default())
    }

    /// Create a new session with an explicit configuration.
    pub fn with_config(arena: &'arena Bump, config: Configuration) -> Self {
        Self {
            arena,
            config,
            stats: RefCell::new(LoweringStats::default()),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Record that a lowering request of the given kind was expanded into `emitted` instructions.
    pub fn record_request_lowered(&self, kind: &str, emitted: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.requests_lowered += 1;
        stats.instructions_emitted += emitted;
        *stats.request_counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Record that a call was replaced by dedicated instructions.
    pub fn record_intrinsic(&self, name: &str) {
        self.stats.borrow_mut().intrinsics_recognized += 1;
        log::trace!("Intrinsic recognised: {name}");
    }

    /// Record that a function was lowered completely.
    pub fn record_function_lowered(&self, name: &str, instruction_count: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_lowered += 1;

        if stats.largest_function_size < instruction_count {
            stats.largest_function_size = instruction_count;
            stats.largest_function_name = name.to_string();
        }
    }

    /// Get lowering statistics.
    pub fn stats(&self) -> LoweringStats {
        self.stats.borrow().clone()
    }
}

/// Lowering statistics.
#[derive(Debug, Default, Clone)]
pub struct LoweringStats {
    /// Number of functions lowered.
    pub functions_lowered: usize,

    /// Number of lowering requests consumed.
    pub requests_lowered: usize,

    /// Number of canonical instructions appended.
    pub instructions_emitted: usize,

    /// Count of each request kind lowered.
    pub request_counts: HashMap<String, usize>,

    /// Calls replaced by dedicated instructions.
    pub intrinsics_recognized: usize,

    /// Instruction count of the largest function.
    pub largest_function_size: usize,

    /// Name of largest function.
    pub largest_function_name: String,
}

impl fmt::Display for LoweringStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lowering Statistics:")?;
        writeln!(f, "  Functions lowered: {}", self.functions_lowered)?;
        writeln!(f, "  Requests lowered: {}", self.requests_lowered)?;
        writeln!(f, "  Instructions emitted: {}", self.instructions_emitted)?;
        writeln!(f, "  Intrinsics recognised: {}", self.intrinsics_recognized)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} instructions)",
                self.largest_function_name, self.largest_function_size
            )?;
        }

        if !self.request_counts.is_empty() {
            writeln!(f, "  Request breakdown:")?;
            let mut sorted: Vec<_> = self.request_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

            for (kind, count) in sorted {
                writeln!(f, "    {kind}: {count}")?;
            }
        }

        Ok(())
    }
}
