//! Core of the Switchyard plugin framework.
//!
//! Plugins are shared libraries loaded into the host process. They talk to
//! each other through typed messages routed by a [`Router`]:
//!
//! - an [`Intent`] is a request answered by exactly one handler,
//! - an [`Event`] is a broadcast observed by any number of receivers.
//!
//! Neither side knows the other's concrete plugin, only the message type.
//! A [`PluginContainer`] loads libraries, gates them on the framework major
//! version, and tears everything down in a fixed order.

pub mod collection;
pub mod config;
pub mod container;
pub mod error;
pub mod info;
pub mod library;
pub mod loader;
pub mod logging;
pub mod message;
pub mod plugin;
pub mod router;
pub mod selector;

pub use config::{ContainerConfig, LeakPolicy};
pub use container::PluginContainer;
pub use error::{ConfigError, ContainerError, Error, LoadError, PluginError, Result, RouterError};
pub use info::{EventInfo, IntentInfo, PluginInfo, Version, FRAMEWORK_VERSION};
pub use library::PluginLibrary;
pub use message::{Event, Intent};
pub use plugin::{Plugin, PluginHandle, PluginRef};
pub use router::{RegistrationMark, Router};
pub use selector::{DefaultSelector, PreferredSelector, Selector};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{ContainerConfig, LeakPolicy};
    pub use crate::container::PluginContainer;
    pub use crate::error::{PluginError, RouterError};
    pub use crate::info::{EventInfo, IntentInfo, PluginInfo, Version};
    pub use crate::message::{Event, Intent};
    pub use crate::plugin::{Plugin, PluginRef};
    pub use crate::router::Router;
    pub use crate::selector::{DefaultSelector, PreferredSelector, Selector};
}
