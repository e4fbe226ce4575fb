use std::cell::RefCell;
use std::rc::Rc;

use mind_core::{
    check_unit, Clock, Fiber, Key, KeyValue, Latch, MindBuilder, MindError, NodeId, Result,
};

use crate::group::{ActionItem, GroupState};
use crate::ActionGroup;

/// One candidate action in an [`ActionGroup`].
///
/// Once selected it runs for its duration: `on_action` fires `(key, 1, 1)` on
/// the start tick and `(key, 0, 1)` on each later tick, then `on_complete`
/// fires `(key, value, 0)` and the group is free again.
#[derive(Clone)]
pub struct ActionNode {
    id: NodeId,
    index: usize,
    path: Rc<str>,
    item: Rc<RefCell<ActionItem>>,
    group: Rc<RefCell<GroupState>>,
    on_action: Fiber<KeyValue>,
    on_complete: Fiber<KeyValue>,
    clock: Clock,
}

impl ActionNode {
    pub fn new(builder: &mut MindBuilder, group: &ActionGroup, name: &str) -> Result<Self> {
        let id = builder.node(group.id(), name)?;
        let path: Rc<str> = Rc::from(builder.path(id)?);
        let on_action = builder.fiber(id, "on_action")?;
        let on_complete = builder.fiber(id, "on_complete")?;

        let item = Rc::new(RefCell::new(ActionItem {
            name: Key::new(name),
            path: Rc::clone(&path),
            key: Key::new(name),
            value: 1.0,
            ticks: None,
            duration: 0,
            active: 0,
            signals: Latch::new(),
        }));

        let index = {
            let mut state = group.state.borrow_mut();
            state.items.push(Rc::clone(&item));
            state.items.len() - 1
        };

        let node = Self {
            id,
            index,
            path,
            item,
            group: Rc::clone(&group.state),
            on_action,
            on_complete,
            clock: group.clock.clone(),
        };

        let state = Rc::clone(&node.group);
        node.on_complete.to(builder, move |_| {
            state.borrow_mut().release(index);
            Ok(())
        })?;

        let (item, state) = (Rc::clone(&node.item), Rc::clone(&node.group));
        builder.on_build(id, move |_ctx| {
            let group_ticks = state.borrow().ticks;
            let mut item = item.borrow_mut();
            item.duration = item.ticks.unwrap_or(group_ticks);
            Ok(())
        })?;

        let ticker = node.clone();
        builder.add_ticker(id, move |_ctx| ticker.tick())?;

        Ok(node)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Key carried by `on_action` and `on_complete`; defaults to the node name.
    pub fn key(&self, builder: &mut MindBuilder, key: impl Into<Key>) -> Result<&Self> {
        builder.check(self.id)?;
        self.item.borrow_mut().key = key.into();
        Ok(self)
    }

    /// Value carried by `on_complete`; defaults to `1`.
    pub fn value(&self, builder: &mut MindBuilder, value: f32) -> Result<&Self> {
        builder.check(self.id)?;
        self.item.borrow_mut().value = check_unit("value", value)?;
        Ok(self)
    }

    /// Duration once selected. Defaults to the group's duration at build.
    pub fn ticks(&self, builder: &mut MindBuilder, ticks: u32) -> Result<&Self> {
        let path = builder.path(self.id)?;
        if ticks == 0 {
            return Err(MindError::InvalidDuration {
                path: path.to_string(),
                ticks,
            });
        }
        self.item.borrow_mut().ticks = Some(ticks);
        Ok(self)
    }

    pub fn to(
        &self,
        builder: &mut MindBuilder,
        target: impl Fn(&KeyValue) -> Result<()> + 'static,
    ) -> Result<&Self> {
        self.on_action.to(builder, target)?;
        Ok(self)
    }

    pub fn on_complete(
        &self,
        builder: &mut MindBuilder,
        target: impl Fn(&KeyValue) -> Result<()> + 'static,
    ) -> Result<&Self> {
        self.on_complete.to(builder, target)?;
        Ok(self)
    }

    pub fn on_action(&self) -> &Fiber<KeyValue> {
        &self.on_action
    }

    pub fn complete_fiber(&self) -> &Fiber<KeyValue> {
        &self.on_complete
    }

    /// Raises this tick window's excitation to at least `value`.
    pub fn excite(&self, value: f32) -> Result<()> {
        check_unit("excite", value)?;
        let now = self.clock.now();
        self.item
            .borrow_mut()
            .signals
            .update(now, |s| s.excite = s.excite.max(value));
        if value > 0.0 {
            self.group.borrow_mut().enabled.update(now, |e| *e = true);
        }
        tracing::debug!(action = %self.path, value, "excite");
        Ok(())
    }

    /// Raises this tick window's inhibition to at least `value`.
    pub fn inhibit(&self, value: f32) -> Result<()> {
        check_unit("inhibit", value)?;
        let now = self.clock.now();
        self.item
            .borrow_mut()
            .signals
            .update(now, |s| s.inhibit = s.inhibit.max(value));
        tracing::debug!(action = %self.path, value, "inhibit");
        Ok(())
    }

    /// Subscriber that excites this action with each payload's value.
    pub fn excite_input(&self) -> impl Fn(&KeyValue) -> Result<()> + 'static {
        let node = self.clone();
        move |kv| node.excite(kv.value)
    }

    /// Subscriber that inhibits this action with each payload's value.
    pub fn inhibit_input(&self) -> impl Fn(&KeyValue) -> Result<()> + 'static {
        let node = self.clone();
        move |kv| node.inhibit(kv.value)
    }

    /// Cancels a running action and frees the group. `on_complete` does not fire.
    pub fn stop(&self) {
        let was_active = std::mem::replace(&mut self.item.borrow_mut().active, 0) > 0;
        if was_active {
            tracing::debug!(action = %self.path, "stop");
            self.group.borrow_mut().release(self.index);
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining() > 0
    }

    /// Active ticks left, `0` when idle.
    pub fn remaining(&self) -> u32 {
        self.item.borrow().active
    }

    pub fn duration(&self) -> u32 {
        self.item.borrow().duration
    }

    fn tick(&self) -> Result<()> {
        let (action, complete) = {
            let mut item = self.item.borrow_mut();
            if item.active == 0 {
                return Ok(());
            }

            let value = if item.active == item.duration { 1.0 } else { 0.0 };
            item.active -= 1;

            let action = KeyValue::new(item.key.clone(), value, 1.0);
            let complete = if item.active == 0 {
                Some(KeyValue::new(item.key.clone(), item.value, 0.0))
            } else {
                None
            };
            (action, complete)
        };

        self.on_action.send(&action)?;
        if let Some(complete) = complete {
            tracing::debug!(action = %self.path, "complete");
            self.on_complete.send(&complete)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ActionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let item = self.item.borrow();
        f.debug_struct("ActionNode")
            .field("path", &self.path)
            .field("key", &item.key)
            .field("duration", &item.duration)
            .field("active", &item.active)
            .finish()
    }
}
