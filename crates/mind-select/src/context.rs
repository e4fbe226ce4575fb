//! Context-keyed outputs.
//!
//! A [`ContextOutput`] keeps one table of learned items per context. Context
//! keys that arrived before a tick switch the table in effect; without new
//! context keys the previous table stays, starting from the default one. Every
//! input key is matched against that table and the last match wins: the output
//! fires `(name, value of that key, 1)`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mind_core::{Clock, Fiber, Key, KeyValue, Latch, MindBuilder, NodeId, Payload, Result};

use crate::selector::Settings;
use crate::Selector;

/// A learned response: the keys it matches and the joined key it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextItem {
    keys: Vec<Key>,
    key: Key,
}

impl ContextItem {
    pub fn new(keys: Vec<Key>) -> Self {
        let joined = keys.iter().map(Key::as_str).collect::<Vec<_>>().join(";");
        Self {
            keys,
            key: Key::from(joined),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn matches_key(&self, key: &Key) -> bool {
        self.keys.contains(key)
    }

    pub fn matches_all(&self, keys: &[Key]) -> bool {
        self.keys.iter().all(|k| keys.contains(k))
    }
}

/// Items learned under one set of context keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    keys: Vec<Key>,
    items: Vec<ContextItem>,
}

impl Context {
    pub fn new(keys: Vec<Key>) -> Self {
        Self {
            keys,
            items: Vec::new(),
        }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    /// True when every key of this context is present in `keys`.
    pub fn is_match(&self, keys: &[Key]) -> bool {
        self.keys.iter().all(|k| keys.contains(k))
    }

    pub fn find(&self, keys: &[Key]) -> Option<&ContextItem> {
        self.items.iter().find(|item| item.matches_all(keys))
    }

    pub fn find_key(&self, key: &Key) -> Option<&ContextItem> {
        self.items.iter().find(|item| item.matches_key(key))
    }

    /// Returns the item matching `keys`, adding one if none does.
    pub fn create(&mut self, keys: Vec<Key>) -> &ContextItem {
        match self.items.iter().position(|item| item.matches_all(&keys)) {
            Some(index) => &self.items[index],
            None => {
                self.items.push(ContextItem::new(keys));
                &self.items[self.items.len() - 1]
            }
        }
    }
}

#[derive(Default)]
struct Inputs {
    keys: Vec<(Key, f32)>,
    contexts: Vec<Key>,
    veto: bool,
}

impl mind_core::Accumulate for Inputs {
    fn accumulate(&mut self, other: Self) {
        self.keys.extend(other.keys);
        self.contexts.extend(other.contexts);
        self.veto |= other.veto;
    }
}

/// Which table is in effect: the default one or `contexts[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Current {
    Default,
    Learned(usize),
}

struct ContextState {
    default: Context,
    contexts: Vec<Context>,
    current: Current,
    inputs: Latch<Inputs>,
    last_keys: Option<Vec<Key>>,
    last_item: Option<Key>,
    unselect_ticks: u32,
}

impl ContextState {
    fn find_or_create(&mut self, keys: Vec<Key>) -> usize {
        match self.contexts.iter().position(|c| c.is_match(&keys)) {
            Some(index) => index,
            None => {
                self.contexts.push(Context::new(keys));
                self.contexts.len() - 1
            }
        }
    }

    fn current(&self) -> &Context {
        match self.current {
            Current::Default => &self.default,
            Current::Learned(index) => &self.contexts[index],
        }
    }

    fn current_mut(&mut self) -> &mut Context {
        match self.current {
            Current::Default => &mut self.default,
            Current::Learned(index) => &mut self.contexts[index],
        }
    }
}

/// Selector output whose response depends on the current context.
#[derive(Clone)]
pub struct ContextOutput {
    id: NodeId,
    name: Key,
    state: Rc<RefCell<ContextState>>,
    settings: Rc<Cell<Settings>>,
    on_select: Fiber<KeyValue>,
    clock: Clock,
}

impl ContextOutput {
    pub fn new(builder: &mut MindBuilder, selector: &Selector, name: &str) -> Result<Self> {
        let id = builder.node(selector.id(), name)?;
        let output = Self {
            id,
            name: Key::new(name),
            state: Rc::new(RefCell::new(ContextState {
                default: Context::default(),
                contexts: Vec::new(),
                current: Current::Default,
                inputs: Latch::new(),
                last_keys: None,
                last_item: None,
                unselect_ticks: 0,
            })),
            settings: Rc::clone(&selector.settings),
            on_select: builder.fiber(id, "on_select")?,
            clock: selector.clock.clone(),
        };

        let ticker = output.clone();
        builder.add_ticker(id, move |ctx| ticker.tick(ctx.tick))?;

        Ok(output)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Feeds input keys. Key+value payloads carry their value; other shapes
    /// use `0`. Payloads without a key are ignored.
    pub fn when<P: Payload>(&self, builder: &mut MindBuilder, fiber: &Fiber<P>) -> Result<&Self> {
        builder.check(self.id)?;
        let output = self.clone();
        fiber.to(builder, move |payload| {
            if let Some(key) = payload.key() {
                let value = payload.value().unwrap_or(0.0);
                output.input(key.clone(), value);
            }
            Ok(())
        })?;
        Ok(self)
    }

    /// Feeds context keys.
    pub fn context<P: Payload>(
        &self,
        builder: &mut MindBuilder,
        fiber: &Fiber<P>,
    ) -> Result<&Self> {
        builder.check(self.id)?;
        let output = self.clone();
        fiber.to(builder, move |payload| {
            if let Some(key) = payload.key() {
                output.context_key(key.clone());
            }
            Ok(())
        })?;
        Ok(self)
    }

    /// Suppresses this output for the selector's unselect countdown.
    pub fn unless<P: Payload>(
        &self,
        builder: &mut MindBuilder,
        fiber: &Fiber<P>,
    ) -> Result<&Self> {
        builder.check(self.id)?;
        let output = self.clone();
        fiber.to(builder, move |_| {
            output.unselect();
            Ok(())
        })?;
        Ok(self)
    }

    pub fn to(
        &self,
        builder: &mut MindBuilder,
        target: impl Fn(&KeyValue) -> Result<()> + 'static,
    ) -> Result<&Self> {
        self.on_select.to(builder, target)?;
        Ok(self)
    }

    pub fn on_select(&self) -> &Fiber<KeyValue> {
        &self.on_select
    }

    /// Seeds `key` as an item of `context` (the default context for `None`).
    pub fn learn_pair(
        &self,
        builder: &mut MindBuilder,
        context: Option<&str>,
        key: &str,
    ) -> Result<&Self> {
        builder.check(self.id)?;
        let mut state = self.state.borrow_mut();
        let table = match context {
            Some(context) => {
                let index = state.find_or_create(vec![Key::new(context)]);
                &mut state.contexts[index]
            }
            None => &mut state.default,
        };
        table.create(vec![Key::new(key)]);
        Ok(self)
    }

    /// Stores the input keys of the last tick as an item of the current context.
    pub fn learn(&self) {
        let mut state = self.state.borrow_mut();
        let Some(keys) = state.last_keys.clone() else {
            return;
        };
        if state.current().find(&keys).is_none() {
            let item = state.current_mut().create(keys);
            tracing::debug!(output = %self.name, item = %item.key(), "learn");
        }
    }

    pub fn input(&self, key: Key, value: f32) {
        let now = self.clock.now();
        self.state
            .borrow_mut()
            .inputs
            .update(now, |inputs| inputs.keys.push((key, value)));
    }

    pub fn context_key(&self, key: Key) {
        let now = self.clock.now();
        self.state
            .borrow_mut()
            .inputs
            .update(now, |inputs| inputs.contexts.push(key));
    }

    pub fn unselect(&self) {
        let now = self.clock.now();
        self.state
            .borrow_mut()
            .inputs
            .update(now, |inputs| inputs.veto = true);
    }

    /// Keys of the context in effect; empty for the default.
    pub fn current_context(&self) -> Vec<Key> {
        self.state.borrow().current().keys().to_vec()
    }

    /// Joined key of the item matched on the last tick, fired or suppressed.
    pub fn last_item(&self) -> Option<Key> {
        self.state.borrow().last_item.clone()
    }

    /// Number of learned (non-default) contexts.
    pub fn context_count(&self) -> usize {
        self.state.borrow().contexts.len()
    }

    fn tick(&self, tick: u64) -> Result<()> {
        let fire = {
            let mut state = self.state.borrow_mut();
            let inputs = state.inputs.take(tick);

            if !inputs.contexts.is_empty() {
                state.current = Current::Learned(state.find_or_create(inputs.contexts));
            }

            if inputs.veto {
                state.unselect_ticks = self.settings.get().unselect_ticks;
            }

            state.last_keys = if inputs.keys.is_empty() {
                None
            } else {
                Some(inputs.keys.iter().map(|(key, _)| key.clone()).collect())
            };

            let matched = inputs
                .keys
                .iter()
                .filter_map(|(key, value)| {
                    let item = state.current().find_key(key)?;
                    Some((item.key().clone(), *value))
                })
                .last();
            state.last_item = matched.as_ref().map(|(item, _)| item.clone());

            let fire = matched.filter(|_| state.unselect_ticks == 0);
            state.unselect_ticks = state.unselect_ticks.saturating_sub(1);
            fire
        };

        match fire {
            Some((item, value)) => {
                tracing::debug!(output = %self.name, %item, value, tick, "context select");
                self.on_select.send(&KeyValue::new(self.name.clone(), value, 1.0))
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ContextOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ContextOutput")
            .field("name", &self.name)
            .field("contexts", &state.contexts.len())
            .field("current", &state.current)
            .field("unselect_ticks", &state.unselect_ticks)
            .finish()
    }
}
