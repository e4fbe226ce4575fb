//! Umbrella crate that re-exports the `mind-*` building blocks.
//!
//! Wire a mind on a [`core::MindBuilder`], add [`action::ActionGroup`]s and
//! [`select::Selector`]s to it, then drive the built [`core::Mind`] one tick
//! at a time.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "core")]
#[cfg_attr(docsrs, doc(cfg(feature = "core")))]
pub use mind_core as core;

#[cfg(feature = "action")]
#[cfg_attr(docsrs, doc(cfg(feature = "action")))]
pub use mind_action as action;

#[cfg(feature = "select")]
#[cfg_attr(docsrs, doc(cfg(feature = "select")))]
pub use mind_select as select;
