//! Profiling hooks around codec work.
//!
//! A profiler hands out guards; the work being measured lives as long as
//! the guard. [`TracingProfiler`] turns each guard into a `tracing` span
//! and reports the elapsed time when the guard drops.

use std::time::Instant;
use tracing::span::EnteredSpan;
use tracing::{debug, debug_span};

/// Hook for measuring message handling.
pub trait EngineProfiler: Send + Sync {
    /// Tracks work on a single message.
    fn track_message(&self, envelope_id: &str, contract: &str) -> ProfileGuard;

    /// Tracks a named unit of work.
    fn track_context(&self, context: &str) -> ProfileGuard;
}

/// Guard returned by [`EngineProfiler`]; measurement ends on drop.
#[must_use = "the measured scope ends when the guard is dropped"]
pub struct ProfileGuard {
    inner: Option<(EnteredSpan, Instant)>,
}

impl ProfileGuard {
    /// Guard that measures nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Enters `span` until the guard drops.
    pub fn enter(span: tracing::Span) -> Self {
        Self {
            inner: Some((span.entered(), Instant::now())),
        }
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        if let Some((span, started)) = self.inner.take() {
            debug!(elapsed_us = started.elapsed().as_micros() as u64, "done");
            drop(span);
        }
    }
}

/// Profiler that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProfiler;

impl EngineProfiler for NullProfiler {
    fn track_message(&self, _envelope_id: &str, _contract: &str) -> ProfileGuard {
        ProfileGuard::disabled()
    }

    fn track_context(&self, _context: &str) -> ProfileGuard {
        ProfileGuard::disabled()
    }
}

/// Profiler backed by `tracing` spans at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProfiler;

impl EngineProfiler for TracingProfiler {
    fn track_message(&self, envelope_id: &str, contract: &str) -> ProfileGuard {
        ProfileGuard::enter(debug_span!("message", envelope_id = %envelope_id, contract = %contract))
    }

    fn track_context(&self, context: &str) -> ProfileGuard {
        ProfileGuard::enter(debug_span!("context", name = %context))
    }
}
