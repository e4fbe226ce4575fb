//! Deterministic, single-threaded mind kernel primitives.
//!
//! A mind is a tree of named nodes rooted at one top node, wired together by
//! typed [`Fiber`]s and advanced one tick at a time by a single scheduler.
//! Wiring happens on a [`MindBuilder`]; [`MindBuilder::build`] consumes it and
//! returns a [`Mind`] that can only tick.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod fiber;
pub mod latch;
pub mod mind;
pub mod node;
pub mod rng;
pub mod theta;
pub mod tick;
pub mod trace;

pub use config::Config;
pub use error::{check_unit, MindError, Result};
pub use fiber::{Fiber, FiberShape, Key, KeyAngle, KeyValue, ObjectP, Payload, Subscriber};
pub use latch::{Accumulate, Latch};
pub use mind::{BuildContext, Mind, MindBuilder};
pub use node::{Facets, MindId, Node, NodeId, Registry};
pub use rng::{DeterministicRng, SampleMode, Sampler, SplitMix64};
pub use theta::Theta;
pub use tick::{Clock, Scheduler, TickContext};
pub use trace::{NullTraceSink, TraceEvent, TraceLog, TraceSink, Tracer, VecTraceSink};
