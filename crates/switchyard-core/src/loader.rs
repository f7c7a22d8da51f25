//! Plugin discovery and loading.
//!
//! Discovery matches files by the platform library extension
//! (`so`, `dylib` or `dll`). Directory entries are visited in sorted order
//! so the resulting load order, and therefore registration order, does not
//! depend on the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use crate::library::{has_library_extension, PluginLibrary};

/// Find plugin library files under `root`.
///
/// - A missing `root` yields nothing.
/// - A `root` that is itself a library file yields just that file.
/// - A directory is scanned one level deep, or fully when `recursive` is set.
///   Symlinked directories are never descended into.
pub fn discover(root: impl AsRef<Path>, recursive: bool) -> Vec<PathBuf> {
    let root = root.as_ref();
    let mut found = Vec::new();

    if !root.exists() {
        tracing::debug!(path = %root.display(), "Plugin path does not exist");
        return found;
    }

    if root.is_file() {
        if has_library_extension(root) {
            found.push(root.to_path_buf());
        }
        return found;
    }

    scan_dir(root, recursive, &mut found);
    found
}

fn scan_dir(dir: &Path, recursive: bool, found: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to read plugin directory");
            return;
        }
    };

    let mut entries: Vec<_> = entries
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "Skipping unreadable directory entry");
                    return None;
                }
            };
            match entry.file_type() {
                Ok(file_type) => Some((entry.path(), file_type)),
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Skipping entry with unknown file type");
                    None
                }
            }
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (path, file_type) in entries {
        if file_type.is_dir() {
            if recursive {
                scan_dir(&path, recursive, found);
            }
        } else if has_library_extension(&path) && path.is_file() {
            // `path.is_file()` follows symlinks, so a link to a library counts.
            tracing::debug!(path = %path.display(), "Discovered plugin library");
            found.push(path);
        }
    }
}

/// Discover, open and activate every plugin library under `root`.
///
/// Files that fail to open, lack the entry point or fail to activate are
/// logged and skipped; one bad file never stops the scan.
pub fn load(root: impl AsRef<Path>, recursive: bool) -> Vec<PluginLibrary> {
    let root = root.as_ref();
    let mut libraries = Vec::new();

    for path in discover(root, recursive) {
        let loaded = PluginLibrary::open(&path).and_then(|mut library| {
            library.activate()?;
            Ok(library)
        });

        match loaded {
            Ok(library) => libraries.push(library),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping plugin library");
            }
        }
    }

    tracing::debug!(
        path = %root.display(),
        loaded = libraries.len(),
        "Finished loading plugin libraries"
    );
    libraries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::consts::DLL_EXTENSION;

    fn lib_name(stem: &str) -> String {
        format!("{stem}.{DLL_EXTENSION}")
    }

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path().join("nope"), true).is_empty());
    }

    #[test]
    fn test_root_file() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join(lib_name("single"));
        let other = dir.path().join("readme.md");
        touch(&lib);
        touch(&other);

        assert_eq!(discover(&lib, false), vec![lib.clone()]);
        assert!(discover(&other, false).is_empty());
    }

    #[test]
    fn test_flat_and_recursive_scan() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();

        touch(&dir.path().join(lib_name("b")));
        touch(&dir.path().join(lib_name("a")));
        touch(&dir.path().join("notes.txt"));
        touch(&nested.join(lib_name("c")));

        let flat = discover(dir.path(), false);
        assert_eq!(
            flat,
            vec![dir.path().join(lib_name("a")), dir.path().join(lib_name("b"))]
        );

        let deep = discover(dir.path(), true);
        assert_eq!(deep.len(), 3);
        assert_eq!(deep[2], nested.join(lib_name("c")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dirs_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        touch(&outside.path().join(lib_name("hidden")));
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(discover(dir.path(), true).is_empty());
    }

    #[test]
    fn test_load_skips_invalid_libraries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(lib_name("broken")), b"garbage").unwrap();
        fs::write(dir.path().join(lib_name("empty")), b"").unwrap();

        assert_eq!(discover(dir.path(), false).len(), 2);
        assert!(load(dir.path(), false).is_empty());
    }
}
