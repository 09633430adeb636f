//! # Per-invocation typed state.
//!
//! [`StateBag`] is the fresh, invocation-scoped container installed on every
//! [`Invocation`](crate::Invocation). Values are keyed by their type, so
//! unrelated steps cannot collide unless they deliberately share a type.
//! Bags are never shared across invocations.
//!
//! ## Example
//! ```
//! use stepline::StateBag;
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct Count(u32);
//!
//! let state = StateBag::default();
//! state.put(Count(1));
//! state.update(|c: &mut Count| c.0 += 1);
//! assert_eq!(state.get::<Count>(), Some(Count(2)));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

type Slots = HashMap<TypeId, Box<dyn Any + Send>>;

/// Invocation-scoped, type-keyed mutable state.
#[derive(Default)]
pub struct StateBag {
    slots: Mutex<Slots>,
}

impl StateBag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        // A panicking step must not wedge state for the rest of the chain.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value`, returning the previously stored value of that type.
    pub fn put<V: Send + 'static>(&self, value: V) -> Option<V> {
        self.slots()
            .insert(TypeId::of::<V>(), Box::new(value))
            .and_then(|prev| prev.downcast::<V>().ok())
            .map(|prev| *prev)
    }

    /// Returns a clone of the stored value of type `V`, if present.
    pub fn get<V: Clone + Send + 'static>(&self) -> Option<V> {
        self.slots()
            .get(&TypeId::of::<V>())
            .and_then(|slot| slot.downcast_ref::<V>())
            .cloned()
    }

    /// Removes and returns the stored value of type `V`, if present.
    pub fn take<V: Send + 'static>(&self) -> Option<V> {
        self.slots()
            .remove(&TypeId::of::<V>())
            .and_then(|slot| slot.downcast::<V>().ok())
            .map(|slot| *slot)
    }

    /// Runs `f` on the stored value of type `V` in place.
    ///
    /// Returns `None` without calling `f` when no value of that type is
    /// stored.
    pub fn update<V: Send + 'static, R>(&self, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.slots()
            .get_mut(&TypeId::of::<V>())
            .and_then(|slot| slot.downcast_mut::<V>())
            .map(f)
    }
}

impl fmt::Debug for StateBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBag")
            .field("slots", &self.slots().len())
            .finish()
    }
}
