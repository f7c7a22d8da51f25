//! Plugin container.
//!
//! The container owns the router and every admitted plugin library. It runs
//! the framework version gate, calls `init` once per plugin, and tears
//! everything down in a fixed order:
//!
//! 1. `deinit` on every plugin, last loaded first
//! 2. clear the router while all libraries are still mapped
//! 3. verify nothing outside the container still holds the router or a plugin
//! 4. drop the libraries, last loaded first
//!
//! A plugin that is still referenced in step 3 is reported as a leak and its
//! library is never unmapped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::{ContainerConfig, LeakPolicy};
use crate::error::ContainerError;
use crate::info::{PluginInfo, FRAMEWORK_VERSION};
use crate::library::{PluginLibrary, StaticFactory};
use crate::loader;
use crate::plugin::PluginRef;
use crate::router::Router;
use crate::selector::Selector;

struct Retained {
    info: PluginInfo,
    library: PluginLibrary,
}

/// Owner of the router and all loaded plugins.
pub struct PluginContainer {
    config: ContainerConfig,
    router: Rc<Router>,
    retained: Vec<Retained>,
    torn_down: bool,
}

impl PluginContainer {
    /// Container with default configuration and the default selector.
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self::from_parts(config, Router::new())
    }

    /// Container whose router dispatches through `selector`.
    pub fn with_selector(selector: impl Selector + 'static) -> Self {
        Self::from_parts(ContainerConfig::default(), Router::with_selector(selector))
    }

    pub fn with_config_and_selector(
        config: ContainerConfig,
        selector: impl Selector + 'static,
    ) -> Self {
        Self::from_parts(config, Router::with_selector(selector))
    }

    fn from_parts(config: ContainerConfig, router: Router) -> Self {
        Self {
            config,
            router: Rc::new(router),
            retained: Vec::new(),
            torn_down: false,
        }
    }

    /// Load every plugin library under `root` and admit the compatible ones.
    ///
    /// Returns non-owning references to the plugins that passed the version
    /// gate and initialised successfully. Libraries that fail any step are
    /// logged and skipped.
    pub fn load(&mut self, root: impl AsRef<Path>, recursive: bool) -> Vec<PluginRef> {
        loader::load(root, recursive)
            .into_iter()
            .filter_map(|library| self.admit(library))
            .collect()
    }

    /// Load every directory listed in the configuration.
    pub fn load_configured(&mut self) -> Vec<PluginRef> {
        let dirs: Vec<PathBuf> = self.config.plugin_dirs.clone();
        let recursive = self.config.recursive;
        dirs.iter()
            .flat_map(|dir| self.load(dir, recursive))
            .collect()
    }

    /// Admit a plugin linked into the host binary.
    ///
    /// Goes through the same version gate and `init` as a loaded library.
    pub fn add_static(
        &mut self,
        label: impl Into<PathBuf>,
        factory: StaticFactory,
    ) -> Option<PluginRef> {
        let mut library = PluginLibrary::from_static(label, factory);
        if let Err(e) = library.activate().map(|_| ()) {
            tracing::warn!(path = %library.path().display(), error = %e, "Skipping static plugin");
            return None;
        }
        self.admit(library)
    }

    fn admit(&mut self, library: PluginLibrary) -> Option<PluginRef> {
        let plugin = Rc::clone(library.plugin()?);
        let (info, version) = {
            let plugin = plugin.borrow();
            (plugin.info(), plugin.framework_version())
        };

        if version.major != FRAMEWORK_VERSION.major {
            tracing::warn!(
                plugin = %info,
                path = %library.path().display(),
                built_against = %version,
                framework = %FRAMEWORK_VERSION,
                "Framework major version mismatch, dropping plugin"
            );
            drop(plugin);
            return None;
        }

        let mark = self.router.mark();
        let result = plugin.borrow_mut().init(&self.router);
        if let Err(e) = result {
            tracing::warn!(plugin = %info, error = %e, "Plugin initialization failed");
            // Only what this `init` registered; another plugin may report the same info.
            self.router.rollback_to(mark);
            drop(plugin);
            return None;
        }

        tracing::info!(plugin = %info, path = %library.path().display(), "Plugin initialized");
        let reference = Rc::downgrade(&plugin);
        self.retained.push(Retained { info, library });
        Some(reference)
    }

    /// Shared router. Do not keep clones past the container's lifetime.
    pub fn router(&self) -> &Rc<Router> {
        &self.router
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Admitted plugins, in load order.
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.retained.iter().map(|r| r.info.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Tear down and report leaked references instead of applying the
    /// container's [`LeakPolicy`].
    pub fn shutdown(mut self) -> Result<(), ContainerError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), ContainerError> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        let mut retained = std::mem::take(&mut self.retained);

        for entry in retained.iter().rev() {
            let Some(plugin) = entry.library.plugin() else {
                continue;
            };
            match plugin.try_borrow_mut() {
                Ok(mut plugin) => plugin.deinit(&self.router),
                Err(_) => {
                    tracing::error!(plugin = %entry.info, "Plugin is borrowed at teardown, skipping deinit")
                }
            }
        }

        self.router.clear();

        let router_refs = Rc::strong_count(&self.router) - 1;
        let leaked: Vec<PluginInfo> = retained
            .iter()
            .filter(|entry| {
                entry
                    .library
                    .plugin()
                    .is_some_and(|plugin| Rc::strong_count(plugin) > 1)
            })
            .map(|entry| entry.info.clone())
            .collect();

        let unloaded = retained.len() - leaked.len();
        while let Some(entry) = retained.pop() {
            drop(entry);
        }

        if router_refs == 0 && leaked.is_empty() {
            tracing::info!(unloaded, "Plugin container shut down");
            return Ok(());
        }

        let err = ContainerError::OwnershipLeak {
            router_refs,
            plugins: leaked,
        };
        tracing::error!(error = %err, "Plugin container shut down with leaked references");
        Err(err)
    }
}

impl Default for PluginContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PluginContainer {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            if self.config.leak_policy == LeakPolicy::Panic && !std::thread::panicking() {
                panic!("{e}");
            }
        }
    }
}

impl fmt::Debug for PluginContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContainer")
            .field("config", &self.config)
            .field("plugins", &self.plugins())
            .field("router", &self.router)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use crate::info::Version;
    use crate::message::Intent;
    use crate::plugin::Plugin;

    struct Echo(String);

    impl Intent for Echo {
        type Output = String;
        const NAME: &'static str = "Echo";
        const VERSION: u32 = 1;
    }

    struct Echoer;

    impl Plugin for Echoer {
        fn info(&self) -> PluginInfo {
            PluginInfo::new("echoer", Version::new(1, 0, 0))
        }

        fn init(&mut self, router: &Rc<Router>) -> Result<(), PluginError> {
            router.register_intent_handler::<Echo, _>(self.info(), |e| e.0)?;
            Ok(())
        }

        fn deinit(&mut self, _router: &Rc<Router>) {}
    }

    struct Failing;

    impl Plugin for Failing {
        fn info(&self) -> PluginInfo {
            PluginInfo::new("failing", Version::new(0, 1, 0))
        }

        fn init(&mut self, router: &Rc<Router>) -> Result<(), PluginError> {
            router.register_intent_handler::<Echo, _>(self.info(), |_| String::new())?;
            Err(PluginError::InitFailed("missing resource".into()))
        }

        fn deinit(&mut self, _router: &Rc<Router>) {}
    }

    fn echoer() -> Box<dyn Plugin> {
        Box::new(Echoer)
    }

    fn failing() -> Box<dyn Plugin> {
        Box::new(Failing)
    }

    #[test]
    fn test_static_plugin_lifecycle() {
        let mut container = PluginContainer::new();
        let plugin = container.add_static("echoer", echoer).unwrap();

        assert_eq!(container.len(), 1);
        assert_eq!(container.plugins()[0].name, "echoer");
        assert_eq!(
            container.router().process_intent(Echo("hi".into())),
            Some("hi".to_string())
        );

        container.shutdown().unwrap();
        assert!(plugin.upgrade().is_none());
    }

    #[test]
    fn test_failed_init_rolls_back_registrations() {
        let mut container = PluginContainer::new();
        assert!(container.add_static("failing", failing).is_none());

        assert!(container.is_empty());
        assert_eq!(container.router().handler_count(), 0);
        container.shutdown().unwrap();
    }

    #[test]
    fn test_load_missing_dir_is_empty() {
        let mut container = PluginContainer::new();
        assert!(container.load("/no/such/plugin/dir", true).is_empty());
        assert!(container.load_configured().is_empty());
    }

    #[test]
    fn test_shutdown_reports_router_leak() {
        let mut container = PluginContainer::new();
        container.add_static("echoer", echoer);
        let router = Rc::clone(container.router());

        let err = container.shutdown().unwrap_err();
        assert_eq!(
            err,
            ContainerError::OwnershipLeak {
                router_refs: 1,
                plugins: vec![]
            }
        );
        // Registrations were cleared before the check.
        assert_eq!(router.handler_count(), 0);
    }
}
