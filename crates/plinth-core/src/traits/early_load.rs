// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Early-load capability exposed to plugin modules.

use std::fmt;

/// Implemented by plugin types that need to run logic while the host starts.
pub trait EarlyLoadPlugin: Send {
    /// Called once per server start, after every early pool has loaded.
    /// `cold_start` is true only for the first start of the process.
    fn on_server_start(&mut self, _cold_start: bool) {}
}

/// Collects early-load handlers while a module's registration entry runs.
#[derive(Default)]
pub struct EarlyLoadRegistrar {
    handlers: Vec<Box<dyn EarlyLoadPlugin>>,
}

impl EarlyLoadRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: EarlyLoadPlugin + 'static>(&mut self, plugin: P) {
        self.handlers.push(Box::new(plugin));
    }

    pub fn register_boxed(&mut self, plugin: Box<dyn EarlyLoadPlugin>) {
        self.handlers.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Consumes the registrar, returning handlers in registration order.
    pub fn into_handlers(self) -> Vec<Box<dyn EarlyLoadPlugin>> {
        self.handlers
    }
}

impl fmt::Debug for EarlyLoadRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EarlyLoadRegistrar")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
