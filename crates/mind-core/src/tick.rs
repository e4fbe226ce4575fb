use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::{NodeId, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickContext {
    pub tick: u64,
}

/// Read-only view of the global tick counter.
///
/// Latches stamp writes with it, so a node can tell "before this tick" from
/// "during this tick" without knowing who called it.
#[derive(Debug, Clone, Default)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    pub fn now(&self) -> u64 {
        self.0.get()
    }

    fn advance(&self) -> u64 {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }
}

pub type TickFn = dyn FnMut(&TickContext) -> Result<()>;

struct Ticker {
    node: NodeId,
    on_tick: Box<TickFn>,
}

/// Ordered list of tickers driven by a single counter.
#[derive(Default)]
pub struct Scheduler {
    clock: Clock,
    tickers: Vec<Ticker>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    pub fn ticks(&self) -> u64 {
        self.clock.now()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub(crate) fn add_ticker(&mut self, node: NodeId, on_tick: Box<TickFn>) {
        self.tickers.push(Ticker { node, on_tick });
    }

    /// Advances the counter and runs every ticker once, in registration order.
    ///
    /// The first error aborts the remaining tickers for this tick.
    pub fn tick(&mut self) -> Result<u64> {
        let tick = self.clock.advance();
        let ctx = TickContext { tick };

        for ticker in self.tickers.iter_mut() {
            tracing::trace!(tick, node = ticker.node.index(), "tick");
            (ticker.on_tick)(&ctx)?;
        }

        Ok(tick)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("ticks", &self.ticks())
            .field("tickers", &self.tickers.len())
            .finish()
    }
}
