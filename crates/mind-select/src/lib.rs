//! Timed select/unselect arbitration.
//!
//! A [`Selector`] collects prioritized select pulses for its outputs and picks
//! one per tick. A [`SelectorOutput`] then fires for `select_ticks` ticks
//! unless an `unless` pulse suppresses it. A [`ContextOutput`] instead maps
//! input keys to learned items, one table per observed context.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod context;
pub mod output;
pub mod selector;

pub use context::{Context, ContextItem, ContextOutput};
pub use output::SelectorOutput;
pub use selector::{
    Selector, Settings, DEFAULT_INTERRUPT_TICKS, DEFAULT_SELECT_TICKS, DEFAULT_UNSELECT_TICKS,
};
