//! Theta rhythm: a square wave on a key+value fiber.

use std::cell::Cell;
use std::rc::Rc;

use crate::{Fiber, Key, KeyValue, MindBuilder, MindError, NodeId, Result};

pub const DEFAULT_THETA_PERIOD: u32 = 10;

/// Emits `(name, 1, 1)` at the start of each period and `(name, 0, 1)` at
/// its half. A period of zero silences it.
#[derive(Clone)]
pub struct Theta {
    id: NodeId,
    key: Key,
    period: Rc<Cell<u32>>,
    on_data: Fiber<KeyValue>,
}

impl Theta {
    pub fn new(builder: &mut MindBuilder, parent: NodeId, name: &str) -> Result<Self> {
        let id = builder.node(parent, name)?;
        let theta = Self {
            id,
            key: Key::new(name),
            period: Rc::new(Cell::new(DEFAULT_THETA_PERIOD)),
            on_data: builder.fiber(id, "on_data")?,
        };

        let period = Rc::clone(&theta.period);
        let key = theta.key.clone();
        let on_data = theta.on_data.clone();
        let mut phase = 0u32;
        builder.add_ticker(id, move |_ctx| {
            let period = period.get();
            if period == 0 {
                return Ok(());
            }

            if phase == 0 {
                on_data.send_key_value(key.clone(), 1.0, 1.0)?;
            } else if phase == period / 2 {
                on_data.send_key_value(key.clone(), 0.0, 1.0)?;
            }

            phase += 1;
            if period <= phase {
                phase = 0;
            }
            Ok(())
        })?;

        Ok(theta)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn period(&self, builder: &mut MindBuilder, period: u32) -> Result<&Self> {
        let path = builder.path(self.id)?;
        if period % 2 != 0 {
            return Err(MindError::InvalidPeriod {
                path: path.to_string(),
                period,
            });
        }
        self.period.set(period);
        Ok(self)
    }

    pub fn on_data(&self) -> &Fiber<KeyValue> {
        &self.on_data
    }

    pub fn to(
        &self,
        builder: &mut MindBuilder,
        target: impl Fn(&KeyValue) -> Result<()> + 'static,
    ) -> Result<&Self> {
        self.on_data.to(builder, target)?;
        Ok(self)
    }
}
