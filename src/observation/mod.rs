//! Lightweight event/span tracing used to diagnose lock-acquisition
//! stalls: callers record "acquired"/"released" events tagged by
//! transaction and resource, and `Ob::analyze` groups them to flag
//! locks never released and the longest-held spans.

mod event;
mod ob;
mod span;

pub(crate) use event::Event;
pub use ob::Ob;
pub(crate) use span::{Span, Spans};
