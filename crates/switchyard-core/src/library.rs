//! Library wrapper.
//!
//! A [`PluginLibrary`] owns one shared library and the single plugin
//! instance created from it. The plugin is always released before the
//! library: its vtable and drop glue live inside the library's code.
//!
//! This is the only module that touches `unsafe` loading primitives.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use libloading::Library;

use crate::error::LoadError;
use crate::info::PluginInfo;
use crate::plugin::{Plugin, PluginCreateFn, PluginHandle, ENTRY_SYMBOL};

/// Factory of a statically linked plugin.
pub type StaticFactory = fn() -> Box<dyn Plugin>;

#[derive(Clone, Copy)]
enum EntryPoint {
    Dynamic(PluginCreateFn),
    Static(StaticFactory),
}

/// One library paired with the plugin it produced.
///
/// Opening resolves the entry point without calling it; [`activate`]
/// constructs the plugin on first use.
///
/// [`activate`]: PluginLibrary::activate
pub struct PluginLibrary {
    path: PathBuf,
    entry: EntryPoint,
    plugin: Option<PluginHandle>,
    library: Option<Library>,
}

impl PluginLibrary {
    /// Open the dynamic library at `path` and resolve its factory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        if !has_library_extension(path) {
            return Err(LoadError::NotALibrary(path.to_path_buf()));
        }

        // SAFETY: mapping a library runs its initialisers. Plugin directories
        // are trusted input; nothing else can be checked before mapping.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        // SAFETY: the symbol is produced by `export_plugin!`, which defines it
        // with exactly the `PluginCreateFn` signature. The copied fn pointer is
        // only called while `library` stays mapped inside this wrapper.
        let create: PluginCreateFn = unsafe {
            *library
                .get::<PluginCreateFn>(ENTRY_SYMBOL.as_bytes())
                .map_err(|source| LoadError::MissingEntryPoint {
                    path: path.to_path_buf(),
                    source,
                })?
        };

        tracing::debug!(path = %path.display(), symbol = ENTRY_SYMBOL, "Resolved plugin entry point");

        Ok(Self {
            path: path.to_path_buf(),
            entry: EntryPoint::Dynamic(create),
            plugin: None,
            library: Some(library),
        })
    }

    /// Wrap a plugin linked into the host binary.
    ///
    /// `label` stands in for the library path in logs and listings.
    pub fn from_static(label: impl Into<PathBuf>, factory: StaticFactory) -> Self {
        Self {
            path: label.into(),
            entry: EntryPoint::Static(factory),
            plugin: None,
            library: None,
        }
    }

    /// Construct the plugin on first call; later calls return the same
    /// instance.
    pub fn activate(&mut self) -> Result<&PluginHandle, LoadError> {
        let plugin = match self.plugin.take() {
            Some(plugin) => plugin,
            None => {
                let plugin = Rc::new(RefCell::new(self.construct()?));
                tracing::debug!(path = %self.path.display(), "Activated plugin");
                plugin
            }
        };
        Ok(&*self.plugin.insert(plugin))
    }

    fn construct(&self) -> Result<Box<dyn Plugin>, LoadError> {
        match self.entry {
            EntryPoint::Dynamic(create) => {
                // SAFETY: `create` was resolved from `self.library`, which is
                // still mapped, and has the `PluginCreateFn` signature.
                let raw = unsafe { create() };
                if raw.is_null() {
                    return Err(LoadError::NullInstance {
                        path: self.path.clone(),
                    });
                }
                // SAFETY: `raw` is non-null and comes from `Box::into_raw` in
                // the plugin's exported factory; ownership passes to us once.
                Ok(unsafe { Box::from_raw(raw) })
            }
            EntryPoint::Static(factory) => Ok(factory()),
        }
    }

    /// Library path, or the label of a static plugin.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this wrapper owns a dynamically loaded library.
    pub fn is_dynamic(&self) -> bool {
        matches!(self.entry, EntryPoint::Dynamic(_))
    }

    pub fn is_active(&self) -> bool {
        self.plugin.is_some()
    }

    /// The activated plugin, if any.
    pub fn plugin(&self) -> Option<&PluginHandle> {
        self.plugin.as_ref()
    }

    /// Info of the activated plugin.
    pub fn info(&self) -> Option<PluginInfo> {
        self.plugin.as_ref().map(|plugin| plugin.borrow().info())
    }
}

impl Drop for PluginLibrary {
    fn drop(&mut self) {
        if let Some(plugin) = self.plugin.take() {
            match Rc::try_unwrap(plugin) {
                Ok(plugin) => drop(plugin),
                Err(plugin) => {
                    tracing::error!(
                        path = %self.path.display(),
                        refs = Rc::strong_count(&plugin) - 1,
                        "Plugin still referenced after release, leaking its library"
                    );
                    if let Some(library) = self.library.take() {
                        std::mem::forget(library);
                    }
                    return;
                }
            }
        }

        if let Some(library) = self.library.take() {
            match library.close() {
                Ok(()) => tracing::debug!(path = %self.path.display(), "Unloaded plugin library"),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to unload plugin library")
                }
            }
        }
    }
}

impl fmt::Debug for PluginLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLibrary")
            .field("path", &self.path)
            .field("dynamic", &self.is_dynamic())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Whether `path` carries this platform's dynamic library extension.
pub fn has_library_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
}
