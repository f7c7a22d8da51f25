//! Intent and event router.
//!
//! The router maps message identities to the callables plugins registered
//! for them and dispatches payloads through the configured [`Selector`].
//!
//! Registration is append-only per entry. All entries of one origin can be
//! dropped at once with [`Router::unregister_origin`]; the container does this
//! before a plugin's library is unloaded so no callable outlives its code.
//!
//! The router is single-threaded (`!Send`, `!Sync`). Callables are cloned out
//! of the registry before they run, so a handler may dispatch or register
//! through the router again while it executes.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::collection::{EventReceiver, HandlerCollection, IntentHandler, ReceiverCollection};
use crate::error::RouterError;
use crate::info::{EventInfo, IntentInfo, PluginInfo};
use crate::message::{Event, Intent};
use crate::selector::{DefaultSelector, Selector};

/// Position in the router's registration history.
///
/// Taken with [`Router::mark`] and passed to [`Router::rollback_to`] to undo
/// everything registered in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegistrationMark(u64);

/// Routes intents to one handler and events to many receivers.
pub struct Router {
    selector: Box<dyn Selector>,
    handlers: RefCell<BTreeMap<IntentInfo, HandlerCollection>>,
    receivers: RefCell<BTreeMap<EventInfo, ReceiverCollection>>,
    next_seq: Cell<u64>,
}

impl Router {
    /// Create a router with the [`DefaultSelector`].
    pub fn new() -> Self {
        Self::with_selector(DefaultSelector)
    }

    /// Create a router with a host-specific selector.
    pub fn with_selector(selector: impl Selector + 'static) -> Self {
        Self {
            selector: Box::new(selector),
            handlers: RefCell::new(BTreeMap::new()),
            receivers: RefCell::new(BTreeMap::new()),
            next_seq: Cell::new(0),
        }
    }

    fn take_seq(&self) -> u64 {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        seq
    }

    /// Register `handler` as a candidate producer for intent `T`.
    ///
    /// The handler is only ever offered intents whose identity equals
    /// `T::info()` exactly; a handler for `{"X", 1}` never sees `{"X", 2}`.
    pub fn register_intent_handler<T, F>(
        &self,
        origin: PluginInfo,
        handler: F,
    ) -> Result<(), RouterError>
    where
        T: Intent,
        F: Fn(T) -> T::Output + 'static,
    {
        let identity = T::info();
        let mut handlers = self.handlers.borrow_mut();
        let collection = handlers
            .entry(identity.clone())
            .or_insert_with(|| HandlerCollection::new(identity.clone(), TypeId::of::<T>()));

        if !collection.accepts(TypeId::of::<T>()) {
            return Err(RouterError::TypeMismatch {
                kind: "intent",
                identity: identity.to_string(),
            });
        }

        tracing::debug!(intent = %identity, plugin = %origin, "Registered intent handler");
        let handler: IntentHandler<T> = Rc::new(handler);
        collection.push(origin, self.take_seq(), Box::new(handler));
        Ok(())
    }

    /// Register `receiver` as an observer of event `T`.
    pub fn register_event_receiver<T, F>(
        &self,
        origin: PluginInfo,
        receiver: F,
    ) -> Result<(), RouterError>
    where
        T: Event,
        F: Fn(&T) -> Option<T::Output> + 'static,
    {
        let identity = T::info();
        let mut receivers = self.receivers.borrow_mut();
        let collection = receivers
            .entry(identity.clone())
            .or_insert_with(|| ReceiverCollection::new(identity.clone(), TypeId::of::<T>()));

        if !collection.accepts(TypeId::of::<T>()) {
            return Err(RouterError::TypeMismatch {
                kind: "event",
                identity: identity.to_string(),
            });
        }

        tracing::debug!(event = %identity, plugin = %origin, "Registered event receiver");
        let receiver: EventReceiver<T> = Rc::new(receiver);
        collection.push(origin, self.take_seq(), Box::new(receiver));
        Ok(())
    }

    /// Dispatch an intent to exactly one handler.
    ///
    /// Returns `None` when nothing is registered for `T` ("unhandled"); the
    /// selector is not consulted in that case. Whatever the chosen handler
    /// returns (or panics with) reaches the caller unchanged.
    pub fn process_intent<T: Intent>(&self, intent: T) -> Option<T::Output> {
        let identity = T::info();
        let handler = {
            let handlers = self.handlers.borrow();
            let collection = handlers.get(&identity)?;
            let origins = collection.origins();
            let index = self.selector.select_handler(&identity, &origins);
            check_index(&identity, index, origins.len());

            match collection.callable::<IntentHandler<T>>(index) {
                Some(handler) => handler,
                None => {
                    tracing::error!(intent = %identity, index, "Stored handler has an unexpected type");
                    return None;
                }
            }
        };

        Some(handler(intent))
    }

    /// Broadcast an event to the receivers chosen by the selector.
    ///
    /// Returns one entry per invoked receiver, in selector order, or an empty
    /// list when nothing is registered for `T`. Every receiver sees the same
    /// payload by shared reference. A panicking receiver aborts the rest of
    /// the broadcast.
    pub fn process_event<T: Event>(&self, event: &T) -> Vec<Option<T::Output>> {
        let identity = T::info();
        let receivers: Vec<EventReceiver<T>> = {
            let receivers = self.receivers.borrow();
            let Some(collection) = receivers.get(&identity) else {
                return Vec::new();
            };
            let origins = collection.origins();
            let selected = self.selector.select_receivers(&identity, &origins);
            check_selection(&identity, &selected, origins.len());

            selected
                .into_iter()
                .filter_map(|index| {
                    let receiver = collection.callable::<EventReceiver<T>>(index);
                    if receiver.is_none() {
                        tracing::error!(event = %identity, index, "Stored receiver has an unexpected type");
                    }
                    receiver
                })
                .collect()
        };

        receivers.iter().map(|receiver| receiver(event)).collect()
    }

    /// Origins able to handle `intent`, in registration order.
    pub fn intent_origins(&self, intent: &IntentInfo) -> Vec<PluginInfo> {
        self.handlers
            .borrow()
            .get(intent)
            .map(HandlerCollection::origins)
            .unwrap_or_default()
    }

    /// Origins observing `event`, in registration order.
    pub fn event_origins(&self, event: &EventInfo) -> Vec<PluginInfo> {
        self.receivers
            .borrow()
            .get(event)
            .map(ReceiverCollection::origins)
            .unwrap_or_default()
    }

    /// Intent identities with at least one handler, in identity order.
    pub fn intents(&self) -> Vec<IntentInfo> {
        self.handlers.borrow().keys().cloned().collect()
    }

    /// Event identities with at least one receiver, in identity order.
    pub fn events(&self) -> Vec<EventInfo> {
        self.receivers.borrow().keys().cloned().collect()
    }

    /// Total number of registered intent handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().values().map(HandlerCollection::len).sum()
    }

    /// Total number of registered event receivers.
    pub fn receiver_count(&self) -> usize {
        self.receivers.borrow().values().map(ReceiverCollection::len).sum()
    }

    /// Remove every handler and receiver registered by `origin`.
    ///
    /// Identities left without entries disappear, so dispatching them is
    /// "unhandled" again. Returns the number of removed entries.
    pub fn unregister_origin(&self, origin: &PluginInfo) -> usize {
        let removed = self.remove_entries(
            |c| c.remove_origin(origin),
            |c| c.remove_origin(origin),
        );
        if removed > 0 {
            tracing::debug!(plugin = %origin, removed, "Unregistered plugin entries");
        }
        removed
    }

    /// Current position in the registration history.
    pub fn mark(&self) -> RegistrationMark {
        RegistrationMark(self.next_seq.get())
    }

    /// Remove every handler and receiver registered since `mark` was taken,
    /// whatever origin they were registered under. Returns the number of
    /// removed entries.
    pub fn rollback_to(&self, mark: RegistrationMark) -> usize {
        let removed = self.remove_entries(
            |c| c.remove_since(mark.0),
            |c| c.remove_since(mark.0),
        );
        if removed > 0 {
            tracing::debug!(removed, "Rolled back registrations");
        }
        removed
    }

    fn remove_entries(
        &self,
        mut from_handlers: impl FnMut(&mut HandlerCollection) -> usize,
        mut from_receivers: impl FnMut(&mut ReceiverCollection) -> usize,
    ) -> usize {
        let mut handlers = self.handlers.borrow_mut();
        let mut removed: usize = handlers.values_mut().map(&mut from_handlers).sum();
        handlers.retain(|_, collection| !collection.is_empty());
        drop(handlers);

        let mut receivers = self.receivers.borrow_mut();
        removed += receivers.values_mut().map(&mut from_receivers).sum::<usize>();
        receivers.retain(|_, collection| !collection.is_empty());
        drop(receivers);

        removed
    }

    /// Drop every registration.
    pub(crate) fn clear(&self) {
        // Take the maps out first so callables are dropped with no borrow held.
        let handlers = std::mem::take(&mut *self.handlers.borrow_mut());
        let receivers = std::mem::take(&mut *self.receivers.borrow_mut());
        drop(handlers);
        drop(receivers);
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("intents", &self.intents())
            .field("events", &self.events())
            .finish_non_exhaustive()
    }
}

fn check_index(identity: &IntentInfo, index: usize, len: usize) {
    if index >= len {
        tracing::error!(intent = %identity, index, len, "Selector returned an out-of-range handler");
        panic!("selector chose handler {index} for {identity}, but only {len} are registered");
    }
}

fn check_selection(identity: &EventInfo, selected: &[usize], len: usize) {
    let mut seen = vec![false; len];
    for &index in selected {
        if index >= len {
            tracing::error!(event = %identity, index, len, "Selector returned an out-of-range receiver");
            panic!("selector chose receiver {index} for {identity}, but only {len} are registered");
        }
        if std::mem::replace(&mut seen[index], true) {
            tracing::error!(event = %identity, index, "Selector returned a receiver twice");
            panic!("selector chose receiver {index} for {identity} more than once");
        }
    }
}
