//! Identity-tagged collections of registered callables.
//!
//! A collection holds every entry registered for one message identity, in
//! registration order. Entries are stored type-erased so that collections for
//! unrelated message types can share one map; the typed callable is recovered
//! with a single checked downcast at dispatch time.
//!
//! Collections are plain data: no part of them is generic over the message
//! type, so the only code pointers they hold belong to the entries
//! themselves. Removing a plugin's entries therefore removes every pointer
//! into that plugin's library.

use std::any::{Any, TypeId};
use std::rc::Rc;

use crate::info::{EventInfo, IntentInfo, PluginInfo};
use crate::message::{Event, Intent};

/// Typed intent handler as stored inside a collection entry.
pub(crate) type IntentHandler<T> = Rc<dyn Fn(T) -> <T as Intent>::Output>;

/// Typed event receiver as stored inside a collection entry.
pub(crate) type EventReceiver<T> = Rc<dyn Fn(&T) -> Option<<T as Event>::Output>>;

struct Entry {
    origin: PluginInfo,
    /// Router-wide registration sequence number.
    seq: u64,
    callable: Box<dyn Any>,
}

/// Ordered entries registered under one message identity.
pub struct Collection<I> {
    identity: I,
    message_type: TypeId,
    entries: Vec<Entry>,
}

/// Intent handlers for one intent identity.
pub type HandlerCollection = Collection<IntentInfo>;

/// Event receivers for one event identity.
pub type ReceiverCollection = Collection<EventInfo>;

impl<I> Collection<I> {
    pub(crate) fn new(identity: I, message_type: TypeId) -> Self {
        Self {
            identity,
            message_type,
            entries: Vec::new(),
        }
    }

    /// Identity every entry in this collection answers to.
    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Origins of all entries, index-aligned with registration order.
    pub fn origins(&self) -> Vec<PluginInfo> {
        self.entries.iter().map(|e| e.origin.clone()).collect()
    }

    /// Whether entries for `message_type` may join this collection.
    pub(crate) fn accepts(&self, message_type: TypeId) -> bool {
        self.message_type == message_type
    }

    pub(crate) fn push(&mut self, origin: PluginInfo, seq: u64, callable: Box<dyn Any>) {
        self.entries.push(Entry {
            origin,
            seq,
            callable,
        });
    }

    /// Clone the typed callable at `index`.
    ///
    /// Returns `None` when the index is out of range or the entry was stored
    /// with another callable type.
    pub(crate) fn callable<C: Any + Clone>(&self, index: usize) -> Option<C> {
        self.entries
            .get(index)
            .and_then(|entry| entry.callable.downcast_ref::<C>())
            .cloned()
    }

    /// Drop every entry registered by `origin`. Returns how many were removed.
    pub(crate) fn remove_origin(&mut self, origin: &PluginInfo) -> usize {
        self.remove_where(|entry| entry.origin == *origin)
    }

    /// Drop every entry registered with a sequence number of at least `seq`.
    pub(crate) fn remove_since(&mut self, seq: u64) -> usize {
        self.remove_where(|entry| entry.seq >= seq)
    }

    fn remove_where(&mut self, remove: impl Fn(&Entry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !remove(entry));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn plugin(name: &str) -> PluginInfo {
        PluginInfo::new(name, Version::new(1, 0, 0))
    }

    #[test]
    fn test_origins_follow_registration_order() {
        let mut c = HandlerCollection::new(IntentInfo::new("X", 1), TypeId::of::<u8>());
        c.push(plugin("b"), 1, Box::new(1u32));
        c.push(plugin("a"), 2, Box::new(2u32));
        c.push(plugin("c"), 3, Box::new(3u32));

        let names: Vec<_> = c.origins().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_callable_downcast() {
        let mut c = ReceiverCollection::new(EventInfo::new("Y", 1), TypeId::of::<u8>());
        c.push(plugin("a"), 7, Box::new(7u32));

        assert_eq!(c.callable::<u32>(0), Some(7));
        assert_eq!(c.callable::<i64>(0), None);
        assert_eq!(c.callable::<u32>(1), None);
    }

    #[test]
    fn test_remove_origin() {
        let mut c = HandlerCollection::new(IntentInfo::new("X", 1), TypeId::of::<u8>());
        c.push(plugin("a"), 1, Box::new(1u32));
        c.push(plugin("b"), 2, Box::new(2u32));
        c.push(plugin("a"), 3, Box::new(3u32));

        assert_eq!(c.remove_origin(&plugin("a")), 2);
        assert_eq!(c.origins(), vec![plugin("b")]);
        assert_eq!(c.callable::<u32>(0), Some(2));
        assert_eq!(c.remove_origin(&plugin("zzz")), 0);
    }

    #[test]
    fn test_remove_since_keeps_older_entries() {
        let mut c = HandlerCollection::new(IntentInfo::new("X", 1), TypeId::of::<u8>());
        c.push(plugin("a"), 4, Box::new(1u32));
        c.push(plugin("a"), 9, Box::new(2u32));

        assert_eq!(c.remove_since(5), 1);
        assert_eq!(c.callable::<u32>(0), Some(1));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_accepts_only_its_message_type() {
        let c = HandlerCollection::new(IntentInfo::new("X", 1), TypeId::of::<u8>());
        assert!(c.accepts(TypeId::of::<u8>()));
        assert!(!c.accepts(TypeId::of::<u16>()));
        assert_eq!(c.identity(), &IntentInfo::new("X", 1));
        assert!(c.is_empty());
    }
}
