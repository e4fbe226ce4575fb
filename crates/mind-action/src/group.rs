use std::cell::RefCell;
use std::rc::Rc;

use mind_core::theta::DEFAULT_THETA_PERIOD;
use mind_core::{
    check_unit, Clock, Fiber, Key, KeyValue, Latch, MindBuilder, MindError, NodeId, Result,
    Sampler, TraceEvent, Tracer,
};

use crate::selection::{select_action, Signals};
use crate::ActionNode;

/// Per-candidate state shared between a group and its action node.
pub(crate) struct ActionItem {
    pub(crate) name: Key,
    pub(crate) path: Rc<str>,
    pub(crate) key: Key,
    pub(crate) value: f32,
    pub(crate) ticks: Option<u32>,
    pub(crate) duration: u32,
    pub(crate) active: u32,
    pub(crate) signals: Latch<Signals>,
}

pub(crate) struct GroupState {
    pub(crate) ticks: u32,
    bias: f32,
    pub(crate) items: Vec<Rc<RefCell<ActionItem>>>,
    current: Option<usize>,
    pub(crate) enabled: Latch<bool>,
}

impl GroupState {
    /// Frees the group if `index` is the running action.
    pub(crate) fn release(&mut self, index: usize) {
        if self.current == Some(index) {
            self.current = None;
        }
    }
}

enum Outcome {
    Busy(Key),
    Idle,
    Started { name: Key, path: Rc<str> },
}

/// Competing candidate actions; starts at most one per tick.
///
/// Each tick the group consumes the signals its actions received before the
/// tick. While an action runs, the group only reports it on
/// `on_action_copy` and the window's signals are dropped. Otherwise, if any
/// action was excited, it runs relaxation-factor selection and starts the
/// winner. Ticks without a winner report `idle` on `on_idle`.
#[derive(Clone)]
pub struct ActionGroup {
    id: NodeId,
    name: Key,
    pub(crate) state: Rc<RefCell<GroupState>>,
    on_action_copy: Fiber<KeyValue>,
    on_idle: Fiber<Key>,
    pub(crate) clock: Clock,
}

impl ActionGroup {
    /// Creates a group under `parent`. The default action duration comes from
    /// the `theta` config key.
    pub fn new(builder: &mut MindBuilder, parent: NodeId, name: &str) -> Result<Self> {
        let id = builder.node(parent, name)?;
        let ticks = builder.config().get("theta", DEFAULT_THETA_PERIOD)?;
        if ticks == 0 {
            return Err(MindError::InvalidDuration {
                path: builder.path(id)?.to_string(),
                ticks,
            });
        }

        let group = Self {
            id,
            name: Key::new(name),
            state: Rc::new(RefCell::new(GroupState {
                ticks,
                bias: 0.0,
                items: Vec::new(),
                current: None,
                enabled: Latch::new(),
            })),
            on_action_copy: builder.fiber(id, "on_action_copy")?,
            on_idle: builder.fiber(id, "on_idle")?,
            clock: builder.clock(),
        };

        let ticker = group.clone();
        let sampler = builder.sampler();
        let tracer = builder.tracer();
        builder.add_ticker(id, move |ctx| ticker.tick(ctx.tick, &sampler, &tracer))?;

        Ok(group)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &Key {
        &self.name
    }

    /// Adds a candidate action named `name` under this group. Fails for any
    /// builder but the one wiring this group's mind.
    pub fn action(&self, builder: &mut MindBuilder, name: &str) -> Result<ActionNode> {
        ActionNode::new(builder, self, name)
    }

    /// Default duration for actions that do not set their own.
    pub fn ticks(&self, builder: &mut MindBuilder, ticks: u32) -> Result<&Self> {
        let path = builder.path(self.id)?;
        if ticks == 0 {
            return Err(MindError::InvalidDuration {
                path: path.to_string(),
                ticks,
            });
        }
        self.state.borrow_mut().ticks = ticks;
        Ok(self)
    }

    pub fn duration(&self) -> u32 {
        self.state.borrow().ticks
    }

    /// Stored and reported only; selection does not read it.
    pub fn bias(&self, builder: &mut MindBuilder, bias: f32) -> Result<&Self> {
        builder.check(self.id)?;
        self.state.borrow_mut().bias = check_unit("bias", bias)?;
        Ok(self)
    }

    pub fn bias_value(&self) -> f32 {
        self.state.borrow().bias
    }

    pub fn on_action_copy(
        &self,
        builder: &mut MindBuilder,
        target: impl Fn(&KeyValue) -> Result<()> + 'static,
    ) -> Result<&Self> {
        self.on_action_copy.to(builder, target)?;
        Ok(self)
    }

    pub fn on_idle(
        &self,
        builder: &mut MindBuilder,
        target: impl Fn(&Key) -> Result<()> + 'static,
    ) -> Result<&Self> {
        self.on_idle.to(builder, target)?;
        Ok(self)
    }

    pub fn action_copy_fiber(&self) -> &Fiber<KeyValue> {
        &self.on_action_copy
    }

    pub fn idle_fiber(&self) -> &Fiber<Key> {
        &self.on_idle
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the running action, if any.
    pub fn current(&self) -> Option<Key> {
        let state = self.state.borrow();
        state
            .current
            .map(|index| state.items[index].borrow().name.clone())
    }

    /// Each action's pending weight at `factor`, without consuming signals.
    pub fn pending_weights(&self, factor: f32) -> Result<Vec<(Key, f32)>> {
        let factor = check_unit("factor", factor)?;
        let state = self.state.borrow();
        Ok(state
            .items
            .iter()
            .map(|item| {
                let item = item.borrow();
                (item.name.clone(), item.signals.peek().weight(factor))
            })
            .collect())
    }

    fn tick(&self, tick: u64, sampler: &Sampler, tracer: &Tracer) -> Result<()> {
        let outcome = {
            let mut state = self.state.borrow_mut();
            let candidates: Vec<Signals> = state
                .items
                .iter()
                .map(|item| item.borrow_mut().signals.take(tick))
                .collect();
            let enabled = state.enabled.take(tick);

            if let Some(current) = state.current {
                let name = state.items[current].borrow().name.clone();
                Outcome::Busy(name)
            } else if !enabled {
                Outcome::Idle
            } else {
                match select_action(&candidates, sampler) {
                    Some(winner) => {
                        state.current = Some(winner);
                        let mut item = state.items[winner].borrow_mut();
                        item.active = item.duration;
                        Outcome::Started {
                            name: item.name.clone(),
                            path: Rc::clone(&item.path),
                        }
                    }
                    None => Outcome::Idle,
                }
            }
        };

        match outcome {
            Outcome::Busy(name) => self.on_action_copy.send_key_value(name, 1.0, 0.0),
            Outcome::Idle => self.on_idle.send(&Key::new("idle")),
            Outcome::Started { name, path } => {
                tracing::debug!(group = %self.name, action = %path, tick, "start action");
                tracer.emit(TraceEvent::new(tick, "action").with_subject(&*path));
                self.on_action_copy.send_key_value(name, 1.0, 0.0)
            }
        }
    }
}

impl std::fmt::Debug for ActionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ActionGroup")
            .field("name", &self.name)
            .field("ticks", &state.ticks)
            .field("actions", &state.items.len())
            .field("current", &state.current)
            .finish()
    }
}
