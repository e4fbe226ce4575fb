use std::cell::RefCell;
use std::rc::Rc;

use mind_core::{
    check_unit, Clock, Fiber, Key, KeyValue, Latch, MindBuilder, NodeId, Payload, Result,
    Subscriber,
};

struct SourceState {
    targets: Vec<(Subscriber<KeyValue>, f32)>,
    activated: Latch<bool>,
}

/// Sends fixed values to its targets on the tick after it is activated.
///
/// Typically wired to [`crate::ActionNode::excite_input`] so that an event
/// nominates a set of actions with preset strengths.
#[derive(Clone)]
pub struct ActionSource {
    id: NodeId,
    name: Key,
    state: Rc<RefCell<SourceState>>,
    clock: Clock,
}

impl ActionSource {
    pub fn new(builder: &mut MindBuilder, parent: NodeId, name: &str) -> Result<Self> {
        let id = builder.node(parent, name)?;
        let source = Self {
            id,
            name: Key::new(name),
            state: Rc::new(RefCell::new(SourceState {
                targets: Vec::new(),
                activated: Latch::new(),
            })),
            clock: builder.clock(),
        };

        let ticker = source.clone();
        builder.add_ticker(id, move |ctx| ticker.tick(ctx.tick))?;

        Ok(source)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Adds a target that receives `(name, value, 1)` on each activation.
    pub fn target(
        &self,
        builder: &mut MindBuilder,
        target: impl Fn(&KeyValue) -> Result<()> + 'static,
        value: f32,
    ) -> Result<&Self> {
        builder.check(self.id)?;
        let value = check_unit("value", value)?;
        self.state
            .borrow_mut()
            .targets
            .push((Rc::new(target), value));
        Ok(self)
    }

    /// Activates on every send of `fiber`, whatever its payload.
    pub fn activate_on<P: Payload>(
        &self,
        builder: &mut MindBuilder,
        fiber: &Fiber<P>,
    ) -> Result<&Self> {
        let source = self.clone();
        fiber.to(builder, move |_| {
            source.activate();
            Ok(())
        })?;
        Ok(self)
    }

    pub fn activate(&self) {
        let now = self.clock.now();
        self.state.borrow_mut().activated.update(now, |a| *a = true);
    }

    fn tick(&self, tick: u64) -> Result<()> {
        let targets = {
            let mut state = self.state.borrow_mut();
            if !state.activated.take(tick) {
                return Ok(());
            }
            state.targets.clone()
        };

        let payload = KeyValue::new(self.name.clone(), 0.0, 1.0);
        for (target, value) in targets {
            target(&KeyValue {
                value,
                ..payload.clone()
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ActionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSource")
            .field("name", &self.name)
            .field("targets", &self.state.borrow().targets.len())
            .finish()
    }
}
