use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mind_core::{Clock, Fiber, Key, Latch, MindBuilder, MindError, NodeId, Payload, Result};

use crate::output::{Command, OutputState};
use crate::{ContextOutput, SelectorOutput};

pub const DEFAULT_SELECT_TICKS: u32 = 2;
pub const DEFAULT_UNSELECT_TICKS: u32 = 2;
pub const DEFAULT_INTERRUPT_TICKS: u32 = 4;

/// Countdown lengths shared by a selector and its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub select_ticks: u32,
    pub unselect_ticks: u32,
    pub interrupt_ticks: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            select_ticks: DEFAULT_SELECT_TICKS,
            unselect_ticks: DEFAULT_UNSELECT_TICKS,
            interrupt_ticks: DEFAULT_INTERRUPT_TICKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Pulse {
    Select { output: usize, p: f32, value: f32 },
    Unselect { output: usize },
}

struct SelectorState {
    gated: bool,
    activated: Latch<bool>,
    interrupts: Latch<bool>,
    pulses: Latch<Vec<Pulse>>,
    outputs: Vec<Rc<RefCell<OutputState>>>,
}

/// Picks one output per tick from the select pulses it received.
///
/// Each tick the selector consumes pulses latched before the tick. An output
/// that was also pulsed `unless` is dropped; among the rest the highest
/// priority wins, first pulse on ties. The winner is commanded to select on
/// the next tick and `on_active` fires.
#[derive(Clone)]
pub struct Selector {
    id: NodeId,
    name: Key,
    state: Rc<RefCell<SelectorState>>,
    pub(crate) settings: Rc<Cell<Settings>>,
    interrupt: Rc<Cell<u32>>,
    on_active: Fiber<()>,
    pub(crate) clock: Clock,
}

impl Selector {
    pub fn new(builder: &mut MindBuilder, parent: NodeId, name: &str) -> Result<Self> {
        let id = builder.node(parent, name)?;
        let selector = Self {
            id,
            name: Key::new(name),
            state: Rc::new(RefCell::new(SelectorState {
                gated: false,
                activated: Latch::new(),
                interrupts: Latch::new(),
                pulses: Latch::new(),
                outputs: Vec::new(),
            })),
            settings: Rc::new(Cell::new(Settings::default())),
            interrupt: Rc::new(Cell::new(0)),
            on_active: builder.fiber(id, "on_active")?,
            clock: builder.clock(),
        };

        let ticker = selector.clone();
        builder.add_ticker(id, move |ctx| ticker.tick(ctx.tick))?;

        Ok(selector)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    /// Ticks an output keeps firing after it is selected.
    pub fn select_ticks(&self, builder: &mut MindBuilder, ticks: u32) -> Result<&Self> {
        let path = builder.path(self.id)?;
        if ticks == 0 {
            return Err(MindError::InvalidDuration {
                path: path.to_string(),
                ticks,
            });
        }
        self.update_settings(|s| s.select_ticks = ticks);
        Ok(self)
    }

    /// Ticks an output stays suppressed after an `unless` pulse.
    pub fn unselect_ticks(&self, builder: &mut MindBuilder, ticks: u32) -> Result<&Self> {
        builder.check(self.id)?;
        self.update_settings(|s| s.unselect_ticks = ticks);
        Ok(self)
    }

    /// Ticks the selector ignores its inputs after [`Selector::interrupt`].
    pub fn interrupt_ticks(&self, builder: &mut MindBuilder, ticks: u32) -> Result<&Self> {
        builder.check(self.id)?;
        self.update_settings(|s| s.interrupt_ticks = ticks);
        Ok(self)
    }

    fn update_settings(&self, update: impl FnOnce(&mut Settings)) {
        let mut settings = self.settings.get();
        update(&mut settings);
        self.settings.set(settings);
    }

    /// Adds an output named `name` under this selector.
    pub fn choose(&self, builder: &mut MindBuilder, name: &str) -> Result<SelectorOutput> {
        SelectorOutput::new(builder, self, name)
    }

    /// Adds a context-keyed output named `name` under this selector.
    pub fn choose_context(&self, builder: &mut MindBuilder, name: &str) -> Result<ContextOutput> {
        ContextOutput::new(builder, self, name)
    }

    /// Gates the selector: it only chooses on ticks after `fiber` fired.
    pub fn when<P: Payload>(&self, builder: &mut MindBuilder, fiber: &Fiber<P>) -> Result<&Self> {
        builder.check(self.id)?;
        let selector = self.clone();
        fiber.to(builder, move |_| {
            selector.activate();
            Ok(())
        })?;
        self.state.borrow_mut().gated = true;
        Ok(self)
    }

    pub fn activate(&self) {
        let now = self.clock.now();
        self.state.borrow_mut().activated.update(now, |a| *a = true);
    }

    /// Ignores all inputs for the configured number of ticks.
    ///
    /// Latched like [`Selector::activate`]: a request made during tick `n`
    /// starts the countdown at tick `n + 1`, whatever order the tickers run in.
    pub fn interrupt(&self) {
        let now = self.clock.now();
        tracing::debug!(selector = %self.name, now, "interrupt requested");
        self.state.borrow_mut().interrupts.update(now, |i| *i = true);
    }

    pub fn interrupt_on<P: Payload>(
        &self,
        builder: &mut MindBuilder,
        fiber: &Fiber<P>,
    ) -> Result<&Self> {
        builder.check(self.id)?;
        let selector = self.clone();
        fiber.to(builder, move |_| {
            selector.interrupt();
            Ok(())
        })?;
        Ok(self)
    }

    /// Ticks left in the running interrupt. A pending request is not counted
    /// until the tick that consumes it.
    pub fn interrupted(&self) -> u32 {
        self.interrupt.get()
    }

    pub fn on_active(
        &self,
        builder: &mut MindBuilder,
        target: impl Fn(&()) -> Result<()> + 'static,
    ) -> Result<&Self> {
        self.on_active.to(builder, target)?;
        Ok(self)
    }

    pub fn active_fiber(&self) -> &Fiber<()> {
        &self.on_active
    }

    pub(crate) fn add_output(&self, output: Rc<RefCell<OutputState>>) -> usize {
        let mut state = self.state.borrow_mut();
        state.outputs.push(output);
        state.outputs.len() - 1
    }

    pub(crate) fn pulse(&self, pulse: Pulse) {
        let now = self.clock.now();
        self.state
            .borrow_mut()
            .pulses
            .update(now, |pulses| pulses.push(pulse));
    }

    fn tick(&self, tick: u64) -> Result<()> {
        let chosen = {
            let mut state = self.state.borrow_mut();
            let pulses = state.pulses.take(tick);
            let activated = state.activated.take(tick);

            if state.interrupts.take(tick) {
                let ticks = self.settings.get().interrupt_ticks;
                tracing::debug!(selector = %self.name, ticks, tick, "interrupt");
                self.interrupt.set(ticks);
            }
            let interrupt = self.interrupt.get();
            if interrupt > 0 {
                self.interrupt.set(interrupt - 1);
                return Ok(());
            }
            if state.gated && !activated {
                return Ok(());
            }

            let vetoed: Vec<usize> = pulses
                .iter()
                .filter_map(|pulse| match pulse {
                    Pulse::Unselect { output } => Some(*output),
                    Pulse::Select { .. } => None,
                })
                .collect();

            let mut best = None;
            let mut best_p = f32::NEG_INFINITY;
            for pulse in &pulses {
                if let Pulse::Select { output, p, value } = *pulse {
                    if vetoed.contains(&output) {
                        continue;
                    }
                    if best_p < p {
                        best_p = p;
                        best = Some((output, value));
                    }
                }
            }

            best.map(|(output, value)| (Rc::clone(&state.outputs[output]), value))
        };

        let Some((output, value)) = chosen else {
            return Ok(());
        };

        {
            let mut output = output.borrow_mut();
            tracing::debug!(selector = %self.name, output = %output.name, value, tick, "select");
            output
                .commands
                .update(tick, |commands| commands.push(Command::Select(value)));
        }
        self.on_active.trigger()
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("name", &self.name)
            .field("settings", &self.settings.get())
            .field("interrupt", &self.interrupt.get())
            .field("outputs", &self.state.borrow().outputs.len())
            .finish()
    }
}
