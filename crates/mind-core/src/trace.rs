#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

/// A small trace event recorded during simulation.
///
/// Dumb data so tooling can render or compare runs afterwards. The action
/// engine records one `action` event per selected winner.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TraceEvent {
    pub tick: u64,
    pub tag: Cow<'static, str>,
    pub subject: String,
}

impl TraceEvent {
    pub fn new(tick: u64, tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tick,
            tag: tag.into(),
            subject: String::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }
}

pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent);
}

#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn emit(&mut self, _event: TraceEvent) {}
}

#[derive(Debug, Default)]
pub struct VecTraceSink {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for VecTraceSink {
    fn emit(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    /// Events carrying `tag`, in recording order.
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a TraceEvent> + 'a {
        self.events.iter().filter(move |e| e.tag == tag)
    }
}

#[derive(Default)]
struct TraceState {
    log: Option<TraceLog>,
    sink: Option<Box<dyn TraceSink>>,
}

/// Shared trace handle: an optional in-memory log and an optional sink.
#[derive(Clone, Default)]
pub struct Tracer {
    state: Rc<RefCell<TraceState>>,
}

impl Tracer {
    pub(crate) fn enable_log(&self) {
        self.state.borrow_mut().log.get_or_insert_with(TraceLog::default);
    }

    pub(crate) fn set_sink(&self, sink: Box<dyn TraceSink>) {
        self.state.borrow_mut().sink = Some(sink);
    }

    pub fn emit(&self, event: TraceEvent) {
        let mut state = self.state.borrow_mut();
        if let Some(log) = state.log.as_mut() {
            log.push(event.clone());
        }
        if let Some(sink) = state.sink.as_mut() {
            sink.emit(event);
        }
    }

    pub fn log(&self) -> Option<TraceLog> {
        self.state.borrow().log.clone()
    }

    pub fn take_log(&self) -> Option<TraceLog> {
        self.state.borrow_mut().log.as_mut().map(std::mem::take)
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Tracer")
            .field("log", &state.log.as_ref().map(|l| l.events.len()))
            .field("sink", &state.sink.is_some())
            .finish()
    }
}
