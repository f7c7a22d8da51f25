//! Plugin contract.
//!
//! A plugin is a shared library exporting one factory symbol,
//! [`ENTRY_SYMBOL`], that returns a boxed [`Plugin`]. The [`export_plugin!`]
//! macro generates it:
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use switchyard_core::prelude::*;
//!
//! #[derive(Default)]
//! struct Calculator;
//!
//! impl Plugin for Calculator {
//!     fn info(&self) -> PluginInfo {
//!         PluginInfo::new("Calculator", Version::new(1, 0, 0))
//!     }
//!
//!     fn init(&mut self, router: &Rc<Router>) -> Result<(), PluginError> {
//!         router.register_intent_handler::<AddIntent, _>(self.info(), |i| i.a + i.b)?;
//!         Ok(())
//!     }
//!
//!     fn deinit(&mut self, _router: &Rc<Router>) {}
//! }
//!
//! switchyard_core::export_plugin!(Calculator::default());
//! ```
//!
//! Host and plugin exchange Rust trait objects, so both must be compiled
//! with the same toolchain against the same framework major version. The
//! major version is checked before `init` is ever called.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::PluginError;
use crate::info::{PluginInfo, Version, FRAMEWORK_VERSION};
use crate::router::Router;

/// Name of the factory symbol every plugin library exports.
pub const ENTRY_SYMBOL: &str = "switchyard_create_plugin";

/// Signature of the exported factory.
pub type PluginCreateFn = unsafe fn() -> *mut dyn Plugin;

/// Owning handle to a plugin instance, held by its library wrapper.
pub type PluginHandle = Rc<RefCell<Box<dyn Plugin>>>;

/// Non-owning reference handed to hosts.
pub type PluginRef = Weak<RefCell<Box<dyn Plugin>>>;

/// A dynamically loaded unit that registers intent handlers and event
/// receivers.
///
/// Lifecycle: created by its factory, checked against the framework major
/// version, `init` once, `deinit` once before unloading, then dropped before
/// its library is released.
pub trait Plugin {
    /// Framework version the plugin was compiled against.
    ///
    /// Leave the default in place: the body is compiled into the plugin
    /// library, so it reports the plugin's build-time version, not the host's.
    fn framework_version(&self) -> Version {
        FRAMEWORK_VERSION
    }

    /// Name and version shown to selectors and users.
    fn info(&self) -> PluginInfo;

    /// Register handlers and receivers.
    ///
    /// Keep clones of `router` out of long-lived state: the container
    /// treats any router reference still alive at teardown as a leak.
    fn init(&mut self, router: &Rc<Router>) -> Result<(), PluginError>;

    /// Called once before the plugin is dropped and its library unloaded.
    ///
    /// The plugin may still dispatch through `router` here, e.g. to tell
    /// other plugins it is going away. Its own entries are removed by the
    /// container afterwards.
    fn deinit(&mut self, router: &Rc<Router>);
}

/// Export a plugin factory from a `cdylib` crate.
///
/// The argument is an expression producing the plugin value; it is
/// evaluated each time the host activates the library.
#[macro_export]
macro_rules! export_plugin {
    ($constructor:expr) => {
        #[no_mangle]
        pub fn switchyard_create_plugin() -> *mut dyn $crate::plugin::Plugin {
            let plugin: ::std::boxed::Box<dyn $crate::plugin::Plugin> =
                ::std::boxed::Box::new($constructor);
            ::std::boxed::Box::into_raw(plugin)
        }
    };
}
