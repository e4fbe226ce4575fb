//! Two-phase lifecycle: a [`MindBuilder`] is wired, then consumed by
//! [`MindBuilder::build`] into a [`Mind`] that can only tick.
//!
//! Every wiring call takes `&mut MindBuilder`, so mutating the graph after
//! build does not compile:
//!
//! ```compile_fail
//! use mind_core::{Fiber, MindBuilder};
//!
//! let mut builder = MindBuilder::new("body");
//! let fiber: Fiber<()> = builder.fiber(builder.top(), "pulse").unwrap();
//! let mind = builder.build().unwrap();
//! fiber.to(&mut builder, |_| Ok(()));
//! ```
//!
//! Nodes and fibers are stamped with their builder's [`MindId`], so wiring
//! them through any other builder fails:
//!
//! ```
//! use mind_core::{Fiber, MindBuilder, MindError};
//!
//! let mut builder = MindBuilder::new("body");
//! let fiber: Fiber<()> = builder.fiber(builder.top(), "pulse").unwrap();
//! let _mind = builder.build().unwrap();
//!
//! let mut other = MindBuilder::new("other");
//! let err = fiber.to(&mut other, |_| Ok(())).unwrap_err();
//! assert!(matches!(err, MindError::ForeignWiring { .. }));
//! ```

use std::fmt;

use crate::node::Registry;
use crate::rng::{DeterministicRng, SampleMode, Sampler, SplitMix64};
use crate::tick::{Clock, Scheduler, TickContext};
use crate::trace::{TraceLog, TraceSink, Tracer};
use crate::{Config, Fiber, MindError, MindId, Node, NodeId, Payload, Result};

/// What build hooks can see while the graph is being frozen.
pub struct BuildContext<'a> {
    pub config: &'a Config,
    pub registry: &'a Registry,
}

type BuildFn = dyn FnOnce(&BuildContext<'_>) -> Result<()>;

struct BuildHook {
    node: NodeId,
    on_build: Box<BuildFn>,
}

/// Wiring phase of a mind.
pub struct MindBuilder {
    mind: MindId,
    registry: Registry,
    scheduler: Scheduler,
    build_hooks: Vec<BuildHook>,
    config: Config,
    sampler: Sampler,
    tracer: Tracer,
}

impl MindBuilder {
    pub fn new(top_name: &str) -> Self {
        let mind = MindId::next();
        Self {
            mind,
            registry: Registry::new(mind, top_name),
            scheduler: Scheduler::new(),
            build_hooks: Vec::new(),
            config: Config::default(),
            sampler: Sampler::seeded(0),
            tracer: Tracer::default(),
        }
    }

    /// Replaces the configuration. Nodes read it when they are created, so set
    /// it before adding them.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(Box::new(SplitMix64::new(seed)))
    }

    pub fn with_rng(self, rng: Box<dyn DeterministicRng>) -> Self {
        self.sampler.replace_rng(rng);
        self
    }

    pub fn with_sample_mode(self, mode: SampleMode) -> Self {
        self.sampler.set_mode(mode);
        self
    }

    pub fn with_trace_log(self) -> Self {
        self.tracer.enable_log();
        self
    }

    pub fn with_trace_sink(self, sink: Box<dyn TraceSink>) -> Self {
        self.tracer.set_sink(sink);
        self
    }

    pub fn mind(&self) -> MindId {
        self.mind
    }

    pub fn top(&self) -> NodeId {
        self.registry.top()
    }

    /// Fails unless `id` belongs to the mind this builder is wiring.
    pub fn check(&self, id: NodeId) -> Result<()> {
        self.registry.check(id)
    }

    pub(crate) fn check_fiber<P: Payload>(&self, fiber: &Fiber<P>) -> Result<()> {
        if fiber.mind() == self.mind {
            Ok(())
        } else {
            Err(MindError::ForeignWiring {
                what: format!("fiber {} of {}", fiber.name(), fiber.mind()),
                mind: self.mind.to_string(),
            })
        }
    }

    /// Registers a child of `parent`.
    pub fn node(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.registry.register(parent, name, false)
    }

    /// Registers a child of `parent` that opens a new side scope.
    pub fn side(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.registry.register(parent, name, true)
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.registry.get(id)
    }

    pub fn path(&self, id: NodeId) -> Result<&str> {
        Ok(self.registry.get(id)?.path())
    }

    pub fn lookup(&self, path: &str) -> Result<&Node> {
        self.registry.lookup(path)
    }

    /// A fiber named after its owning node.
    pub fn fiber<P: Payload>(&self, owner: NodeId, name: &str) -> Result<Fiber<P>> {
        let prefix = self.registry.get(owner)?.prefix();
        Ok(Fiber::new(self.mind, format!("{prefix}{name}")))
    }

    /// Appends a ticker; tickers run in the order they were added.
    pub fn add_ticker(
        &mut self,
        node: NodeId,
        on_tick: impl FnMut(&TickContext) -> Result<()> + 'static,
    ) -> Result<()> {
        self.registry.facets_mut(node)?.tickable = true;
        self.scheduler.add_ticker(node, Box::new(on_tick));
        Ok(())
    }

    /// Runs `on_build` once during [`MindBuilder::build`], in registration order.
    pub fn on_build(
        &mut self,
        node: NodeId,
        on_build: impl FnOnce(&BuildContext<'_>) -> Result<()> + 'static,
    ) -> Result<()> {
        self.registry.facets_mut(node)?.buildable = true;
        self.build_hooks.push(BuildHook {
            node,
            on_build: Box::new(on_build),
        });
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> Clock {
        self.scheduler.clock()
    }

    pub fn sampler(&self) -> Sampler {
        self.sampler.clone()
    }

    pub fn tracer(&self) -> Tracer {
        self.tracer.clone()
    }

    /// Freezes the graph.
    pub fn build(self) -> Result<Mind> {
        let ctx = BuildContext {
            config: &self.config,
            registry: &self.registry,
        };

        for hook in self.build_hooks {
            tracing::trace!(node = hook.node.index(), "build");
            (hook.on_build)(&ctx)?;
        }

        tracing::info!(
            top = self.registry.top_node().path(),
            nodes = self.registry.len(),
            tickers = self.scheduler.len(),
            "mind built"
        );

        Ok(Mind {
            mind: self.mind,
            registry: self.registry,
            scheduler: self.scheduler,
            config: self.config,
            tracer: self.tracer,
        })
    }
}

impl fmt::Debug for MindBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MindBuilder")
            .field("nodes", &self.registry.len())
            .field("scheduler", &self.scheduler)
            .field("build_hooks", &self.build_hooks.len())
            .finish()
    }
}

/// Frozen, tick-only mind.
pub struct Mind {
    mind: MindId,
    registry: Registry,
    scheduler: Scheduler,
    config: Config,
    tracer: Tracer,
}

impl Mind {
    /// Advances the global tick and runs every ticker once.
    pub fn tick(&mut self) -> Result<u64> {
        self.scheduler.tick()
    }

    /// Runs `n` ticks, returning the last tick number.
    pub fn run(&mut self, n: u64) -> Result<u64> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(self.ticks())
    }

    pub fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }

    pub fn clock(&self) -> Clock {
        self.scheduler.clock()
    }

    pub fn mind(&self) -> MindId {
        self.mind
    }

    pub fn top(&self) -> &Node {
        self.registry.top_node()
    }

    pub fn lookup(&self, path: &str) -> Result<&Node> {
        self.registry.lookup(path)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn trace_log(&self) -> Option<TraceLog> {
        self.tracer.log()
    }

    pub fn take_trace_log(&mut self) -> Option<TraceLog> {
        self.tracer.take_log()
    }
}

impl fmt::Debug for Mind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mind")
            .field("top", &self.top().path())
            .field("nodes", &self.registry.len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
