//! Fibers: typed, synchronous publish/subscribe channels between nodes.
//!
//! A fiber carries exactly one of five payload shapes, fixed by its type
//! parameter. Subscribers can only be attached through a [`MindBuilder`],
//! so once the mind is built the subscriber list is frozen.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MindBuilder, MindId, Result};

/// Cheaply clonable string key carried by most fiber payloads.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Rc<str>);

impl Key {
    pub fn new(key: &str) -> Self {
        Self(Rc::from(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Key {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self(Rc::from(value))
    }
}

impl PartialEq<str> for Key {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Key {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(feature = "serialize")]
impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serialize")]
impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Key::from)
    }
}

/// Directional sense: `angle` in `[0, 1)`, clockwise, `0` straight ahead.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAngle {
    pub key: Key,
    pub angle: f32,
}

/// Graded signal: `value` and confidence `p`, both in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: Key,
    pub value: f32,
    pub p: f32,
}

impl KeyValue {
    pub fn new(key: impl Into<Key>, value: f32, p: f32) -> Self {
        Self {
            key: key.into(),
            value,
            p,
        }
    }
}

/// Opaque pass-through payload with a confidence.
#[derive(Clone)]
pub struct ObjectP {
    pub object: Rc<dyn Any>,
    pub p: f32,
}

impl fmt::Debug for ObjectP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectP").field("p", &self.p).finish_non_exhaustive()
    }
}

/// Tag of a fiber's payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum FiberShape {
    Unit,
    Key,
    KeyAngle,
    KeyValue,
    Object,
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for () {}
    impl Sealed for super::Key {}
    impl Sealed for super::KeyAngle {}
    impl Sealed for super::KeyValue {}
    impl Sealed for super::ObjectP {}
}

/// The closed set of fiber payloads.
pub trait Payload: sealed::Sealed + 'static {
    const SHAPE: FiberShape;

    fn key(&self) -> Option<&Key> {
        None
    }

    fn value(&self) -> Option<f32> {
        None
    }
}

impl Payload for () {
    const SHAPE: FiberShape = FiberShape::Unit;
}

impl Payload for Key {
    const SHAPE: FiberShape = FiberShape::Key;

    fn key(&self) -> Option<&Key> {
        Some(self)
    }
}

impl Payload for KeyAngle {
    const SHAPE: FiberShape = FiberShape::KeyAngle;

    fn key(&self) -> Option<&Key> {
        Some(&self.key)
    }
}

impl Payload for KeyValue {
    const SHAPE: FiberShape = FiberShape::KeyValue;

    fn key(&self) -> Option<&Key> {
        Some(&self.key)
    }

    fn value(&self) -> Option<f32> {
        Some(self.value)
    }
}

impl Payload for ObjectP {
    const SHAPE: FiberShape = FiberShape::Object;
}

pub type Subscriber<P> = Rc<dyn Fn(&P) -> Result<()>>;

struct FiberInner<P: Payload> {
    mind: MindId,
    name: String,
    subscribers: RefCell<Vec<Subscriber<P>>>,
}

/// Named channel with an ordered subscriber list.
pub struct Fiber<P: Payload> {
    inner: Rc<FiberInner<P>>,
}

impl<P: Payload> Fiber<P> {
    pub(crate) fn new(mind: MindId, name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(FiberInner {
                mind,
                name: name.into(),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The mind whose builder created this fiber.
    pub fn mind(&self) -> MindId {
        self.inner.mind
    }

    pub fn shape(&self) -> FiberShape {
        P::SHAPE
    }

    pub fn len(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attaches a subscriber. Only possible through the builder of the mind
    /// that owns this fiber, so the list is frozen once that mind is built.
    pub fn to(
        &self,
        wiring: &mut MindBuilder,
        subscriber: impl Fn(&P) -> Result<()> + 'static,
    ) -> Result<&Self> {
        wiring.check_fiber(self)?;
        self.inner
            .subscribers
            .borrow_mut()
            .push(Rc::new(subscriber));
        Ok(self)
    }

    /// Forwards every send on this fiber to `target`.
    pub fn forward(&self, wiring: &mut MindBuilder, target: &Fiber<P>) -> Result<&Self> {
        wiring.check_fiber(target)?;
        let target = target.clone();
        self.to(wiring, move |payload| target.send(payload))
    }

    /// Calls every subscriber in attachment order.
    ///
    /// The first subscriber error aborts the send and is returned to the sender.
    pub fn send(&self, payload: &P) -> Result<()> {
        let subscribers = self.inner.subscribers.borrow();
        for subscriber in subscribers.iter() {
            subscriber(payload)?;
        }
        Ok(())
    }
}

impl Fiber<()> {
    pub fn trigger(&self) -> Result<()> {
        self.send(&())
    }
}

impl Fiber<KeyValue> {
    pub fn send_key_value(&self, key: impl Into<Key>, value: f32, p: f32) -> Result<()> {
        self.send(&KeyValue::new(key, value, p))
    }
}

impl<P: Payload> Clone for Fiber<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: Payload> fmt::Display for Fiber<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fiber:{:?}[{}]", P::SHAPE, self.inner.name)
    }
}

impl<P: Payload> fmt::Debug for Fiber<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("mind", &self.inner.mind)
            .field("name", &self.inner.name)
            .field("shape", &P::SHAPE)
            .field("subscribers", &self.len())
            .finish()
    }
}
