//! Fixture plugin for the dynamic loading tests.
//!
//! Built as a `cdylib` it is loaded by the host through
//! [`switchyard_core::export_plugin!`]; as an `rlib` it shares its message
//! types with the test binary.

use std::rc::Rc;

use switchyard_core::prelude::*;

pub const PLUGIN_NAME: &str = "calculator";

/// Adds two numbers.
pub struct Add {
    pub a: i64,
    pub b: i64,
}

impl Intent for Add {
    type Output = i64;
    const NAME: &'static str = "Add";
    const VERSION: u32 = 1;
}

/// Asks every plugin to identify itself.
pub struct Ping;

impl Event for Ping {
    type Output = String;
    const NAME: &'static str = "Ping";
    const VERSION: u32 = 1;
}

#[derive(Debug, Default)]
pub struct Calculator;

impl Plugin for Calculator {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(PLUGIN_NAME, Version::new(1, 0, 0))
    }

    fn init(&mut self, router: &Rc<Router>) -> Result<(), PluginError> {
        let info = self.info();
        router.register_intent_handler::<Add, _>(info.clone(), |add| add.a + add.b)?;
        router.register_event_receiver::<Ping, _>(info.clone(), move |_| {
            Some(info.to_string())
        })?;
        tracing::debug!("Calculator registered");
        Ok(())
    }

    fn deinit(&mut self, _router: &Rc<Router>) {
        tracing::debug!("Calculator shutting down");
    }
}

switchyard_core::export_plugin!(Calculator);
