//! Dispatch tie-break policies.
//!
//! The router hands the selector the origins registered for an identity and
//! lets it decide who answers. Hosts replace the policy to, for example, ask
//! the user which plugin should open a file when several can.

use crate::info::{EventInfo, IntentInfo, PluginInfo};

/// Chooses which registered origins handle a dispatch.
///
/// `origins` is never empty when the router calls a selector. Returning an
/// index outside `0..origins.len()`, or the same index twice from
/// [`select_receivers`](Selector::select_receivers), is a programming error
/// and makes the router panic.
pub trait Selector {
    /// Pick the single handler for an intent. Default: first registered.
    fn select_handler(&self, intent: &IntentInfo, origins: &[PluginInfo]) -> usize {
        let _ = (intent, origins);
        0
    }

    /// Pick the receivers of an event, in invocation order.
    /// Default: every receiver, in registration order.
    fn select_receivers(&self, event: &EventInfo, origins: &[PluginInfo]) -> Vec<usize> {
        let _ = event;
        (0..origins.len()).collect()
    }
}

/// First-registered-wins for intents, broadcast to all for events.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSelector;

impl Selector for DefaultSelector {}

/// Prefers plugins by name, in the given order of preference.
///
/// For intents the first origin whose name appears earliest in the
/// preference list wins; unknown origins fall back to registration order.
/// For events, preferred origins are invoked first (in preference order),
/// followed by the rest in registration order.
#[derive(Debug, Clone, Default)]
pub struct PreferredSelector {
    preferred: Vec<String>,
}

impl PreferredSelector {
    pub fn new<I, S>(preferred: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            preferred: preferred.into_iter().map(Into::into).collect(),
        }
    }

    fn rank(&self, origin: &PluginInfo) -> usize {
        self.preferred
            .iter()
            .position(|name| *name == origin.name)
            .unwrap_or(self.preferred.len())
    }
}

impl Selector for PreferredSelector {
    fn select_handler(&self, _intent: &IntentInfo, origins: &[PluginInfo]) -> usize {
        // `min_by_key` keeps the first of equal ranks, i.e. registration order.
        origins
            .iter()
            .enumerate()
            .min_by_key(|(_, origin)| self.rank(origin))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    fn select_receivers(&self, _event: &EventInfo, origins: &[PluginInfo]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..origins.len()).collect();
        // Stable sort keeps registration order among equal ranks.
        order.sort_by_key(|&index| self.rank(&origins[index]));
        order
    }
}
