//! Action competition engine.
//!
//! An [`ActionGroup`] owns candidate [`ActionNode`]s. Sensors excite or
//! inhibit candidates; on its next tick the group runs relaxation-factor
//! selection (see [`selection`]) and starts at most one winner, which then
//! stays active for its duration before the group can choose again.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod group;
pub mod node;
pub mod selection;
pub mod source;

pub use group::ActionGroup;
pub use node::ActionNode;
pub use selection::{select_action, select_factor, Signals, RELAXATION_FACTORS};
pub use source::ActionSource;
