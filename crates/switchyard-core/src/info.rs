//! Identity model: versions, plugin identities and message identities.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Semantic version `{major, minor, patch}`.
///
/// Only `major` takes part in the ABI gate; minor and patch are informational.
pub use semver::Version;

/// Version of the framework this crate was compiled as.
///
/// Every plugin embeds the value it was built against through
/// [`Plugin::framework_version`](crate::plugin::Plugin::framework_version).
pub const FRAMEWORK_VERSION: Version = Version::new(
    parse_component(env!("CARGO_PKG_VERSION_MAJOR")),
    parse_component(env!("CARGO_PKG_VERSION_MINOR")),
    parse_component(env!("CARGO_PKG_VERSION_PATCH")),
);

const fn parse_component(digits: &str) -> u64 {
    let bytes = digits.as_bytes();
    let mut value = 0u64;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u64;
        i += 1;
    }
    value
}

/// Display and selection identity of a loaded plugin.
///
/// Always passed by value; nothing in the framework keeps a reference into a
/// plugin's own storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name
    pub name: String,

    /// Plugin version
    pub version: Version,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl Display for PluginInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

// Field order matters: the derived `Ord` compares `name` first, then
// `version`, which is the lexicographic total order the router maps rely on.
macro_rules! message_identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name {
            /// Message name, unique per message type.
            pub name: String,

            /// Message version. Any change to the payload or result layout
            /// must bump it.
            pub version: u32,
        }

        impl $name {
            pub fn new(name: impl Into<String>, version: u32) -> Self {
                Self {
                    name: name.into(),
                    version,
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}@v{}", self.name, self.version)
            }
        }
    };
}

message_identity!(
    /// Identity of an intent type.
    IntentInfo
);

message_identity!(
    /// Identity of an event type.
    EventInfo
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_version_matches_package() {
        assert_eq!(
            FRAMEWORK_VERSION.to_string(),
            env!("CARGO_PKG_VERSION").split('-').next().unwrap()
        );
    }

    #[test]
    fn test_identity_equality_requires_name_and_version() {
        assert_eq!(IntentInfo::new("X", 1), IntentInfo::new("X", 1));
        assert_ne!(IntentInfo::new("X", 1), IntentInfo::new("X", 2));
        assert_ne!(IntentInfo::new("X", 1), IntentInfo::new("Y", 1));
    }

    #[test]
    fn test_identity_order_is_lexicographic() {
        let a = IntentInfo::new("A", 5);
        let b = IntentInfo::new("B", 1);
        let b2 = IntentInfo::new("B", 2);

        // Name dominates version.
        assert!(a < b);
        assert!(b < b2);
        assert!(a < b2);
        assert!(!(b < a));

        // Both directions must agree for BTreeMap keys.
        assert!(b2 > a);
        let mut ids = vec![b2.clone(), a.clone(), b.clone()];
        ids.sort();
        assert_eq!(ids, vec![a, b, b2]);
    }

    #[test]
    fn test_event_identity_display() {
        assert_eq!(EventInfo::new("LogEvent", 3).to_string(), "LogEvent@v3");
    }

    #[test]
    fn test_plugin_info_display_and_serde() {
        let info = PluginInfo::new("Calculator", Version::new(1, 2, 3));
        assert_eq!(info.to_string(), "Calculator v1.2.3");

        let json = serde_json::to_string(&info).unwrap();
        let back: PluginInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
