//! Message traits.
//!
//! A message type is any `'static` type that names itself with a
//! `{name, version}` pair. Plugins sharing a message type only need to agree
//! on the type definition; neither side knows the other's concrete plugin.
//!
//! ```rust
//! use switchyard_core::Intent;
//!
//! pub struct AddIntent {
//!     pub a: i32,
//!     pub b: i32,
//! }
//!
//! impl Intent for AddIntent {
//!     type Output = i32;
//!     const NAME: &'static str = "AddIntent";
//!     const VERSION: u32 = 3;
//! }
//!
//! assert_eq!(AddIntent::info().to_string(), "AddIntent@v3");
//! ```

use crate::info::{EventInfo, IntentInfo};

/// Request answered by exactly one registered handler.
pub trait Intent: 'static {
    /// Value produced by the handler.
    type Output: 'static;

    const NAME: &'static str;
    const VERSION: u32;

    fn info() -> IntentInfo
    where
        Self: Sized,
    {
        IntentInfo::new(Self::NAME, Self::VERSION)
    }
}

/// Broadcast observed by zero or more receivers.
pub trait Event: 'static {
    /// Value each receiver may answer with.
    type Output: 'static;

    const NAME: &'static str;
    const VERSION: u32;

    fn info() -> EventInfo
    where
        Self: Sized,
    {
        EventInfo::new(Self::NAME, Self::VERSION)
    }
}
