use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mind_core::{check_unit, Fiber, Key, KeyValue, Latch, MindBuilder, NodeId, Payload, Result};

use crate::selector::{Pulse, Settings};
use crate::Selector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Command {
    Select(f32),
    Unselect,
}

pub(crate) struct OutputState {
    pub(crate) name: Key,
    pub(crate) commands: Latch<Vec<Command>>,
    select_ticks: u32,
    unselect_ticks: u32,
    value: f32,
}

/// One choice of a [`Selector`].
///
/// Once selected it fires `(name, value, 1)` on `on_select` every tick while
/// its select countdown runs and no unselect countdown is pending.
#[derive(Clone)]
pub struct SelectorOutput {
    id: NodeId,
    index: usize,
    selector: Selector,
    state: Rc<RefCell<OutputState>>,
    settings: Rc<Cell<Settings>>,
    on_select: Fiber<KeyValue>,
}

impl SelectorOutput {
    pub fn new(builder: &mut MindBuilder, selector: &Selector, name: &str) -> Result<Self> {
        let id = builder.node(selector.id(), name)?;
        let state = Rc::new(RefCell::new(OutputState {
            name: Key::new(name),
            commands: Latch::new(),
            select_ticks: 0,
            unselect_ticks: 0,
            value: 1.0,
        }));
        let index = selector.add_output(Rc::clone(&state));

        let output = Self {
            id,
            index,
            selector: selector.clone(),
            state,
            settings: Rc::clone(&selector.settings),
            on_select: builder.fiber(id, "on_select")?,
        };

        let ticker = output.clone();
        builder.add_ticker(id, move |ctx| ticker.tick(ctx.tick))?;

        Ok(output)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Pulses a select with priority `p` on every send of `fiber`.
    ///
    /// Key+value payloads carry their value through to `on_select`; other
    /// shapes select with value `1`.
    pub fn when<P: Payload>(
        &self,
        builder: &mut MindBuilder,
        fiber: &Fiber<P>,
        p: f32,
    ) -> Result<&Self> {
        builder.check(self.id)?;
        let p = check_unit("p", p)?;
        let (selector, output) = (self.selector.clone(), self.index);
        fiber.to(builder, move |payload| {
            let value = check_unit("select", payload.value().unwrap_or(1.0))?;
            selector.pulse(Pulse::Select { output, p, value });
            Ok(())
        })?;
        Ok(self)
    }

    /// Vetoes this output's select pulses in the same window and suppresses
    /// it for the unselect countdown.
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

    pub fn unselect(&self) {
        let now = self.selector.clock.now();
        self.selector.pulse(Pulse::Unselect { output: self.index });
        self.state
            .borrow_mut()
            .commands
            .update(now, |commands| commands.push(Command::Unselect));
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

    /// Remaining `(select, unselect)` countdowns.
    pub fn countdowns(&self) -> (u32, u32) {
        let state = self.state.borrow();
        (state.select_ticks, state.unselect_ticks)
    }

    fn tick(&self, tick: u64) -> Result<()> {
        let fire = {
            let settings = self.settings.get();
            let mut state = self.state.borrow_mut();

            for command in state.commands.take(tick) {
                match command {
                    Command::Select(value) => {
                        state.select_ticks = settings.select_ticks;
                        state.value = value;
                    }
                    Command::Unselect => state.unselect_ticks = settings.unselect_ticks,
                }
            }

            let fire = (state.select_ticks > 0 && state.unselect_ticks == 0)
                .then(|| KeyValue::new(state.name.clone(), state.value, 1.0));

            state.select_ticks = state.select_ticks.saturating_sub(1);
            state.unselect_ticks = state.unselect_ticks.saturating_sub(1);
            fire
        };

        match fire {
            Some(payload) => self.on_select.send(&payload),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for SelectorOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SelectorOutput")
            .field("name", &state.name)
            .field("select_ticks", &state.select_ticks)
            .field("unselect_ticks", &state.unselect_ticks)
            .finish()
    }
}
