//! Structured trace event emission (the "trace sink" external collaborator).
//!
//! The real device's shell routes these to a trace/dump facility; we only
//! need an interface the engines can call into. [`LogTraceSink`] forwards to
//! the `log` crate so a host embedding this crate gets events for free
//! through whatever subscriber it already has wired up.

use std::fmt;

/// Severity of a trace event, mirroring the origin project's trace levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Error,
    FatalError,
}

/// A single structured trace event.
pub struct TraceEvent<'a> {
    pub severity: Severity,
    pub origin: &'static str,
    pub message: fmt::Arguments<'a>,
}

/// External collaborator that receives trace events emitted by the device.
pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent<'_>);
}

/// Default sink: forwards every event to the `log` crate.
#[derive(Debug, Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn emit(&mut self, event: TraceEvent<'_>) {
        match event.severity {
            Severity::Debug => log::debug!(target: "ccp", "[{}] {}", event.origin, event.message),
            Severity::Info => log::info!(target: "ccp", "[{}] {}", event.origin, event.message),
            Severity::Error => log::error!(target: "ccp", "[{}] {}", event.origin, event.message),
            Severity::FatalError => {
                log::error!(target: "ccp", "[{}] FATAL: {}", event.origin, event.message)
            }
        }
    }
}

/// No-op sink, for callers that don't care about tracing.
#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn emit(&mut self, _event: TraceEvent<'_>) {}
}

macro_rules! trace_evt {
    ($sink:expr, $sev:expr, $origin:expr, $($arg:tt)*) => {
        $sink.emit($crate::trace::TraceEvent {
            severity: $sev,
            origin: $origin,
            message: format_args!($($arg)*),
        })
    };
}

pub(crate) use trace_evt;
