//! Registry of format plugins.
//!
//! One plugin per format name. A registration only replaces an existing entry
//! when its priority is at least as high, so a user plugin built with priority
//! 1 overrides the built-in JSON plugin (priority 0), and the later of two
//! equal-priority registrations wins.

use crate::traits::FormatPlugin;
use std::collections::HashMap;
use std::sync::Arc;

struct RegisteredPlugin {
    plugin: Arc<dyn FormatPlugin>,
    priority: u8,
}

/// Format name to plugin mapping.
///
/// Filled once before generation starts and only read afterwards; share it by
/// reference across workers.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, RegisteredPlugin>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in plugins enabled at compile time.
    pub fn with_builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "plugin-json")]
        {
            registry.register(Arc::new(crate::output::JsonFormatPlugin::new()), 0);
        }

        registry
    }

    /// Register `plugin` under its format name with an explicit priority.
    ///
    /// Returns false, leaving the registry unchanged, when a plugin with a
    /// higher priority already holds the name.
    pub fn register(&mut self, plugin: Arc<dyn FormatPlugin>, priority: u8) -> bool {
        let name = plugin.format_name().to_string();
        if let Some(existing) = self.plugins.get(&name)
            && priority < existing.priority
        {
            tracing::debug!(
                format = %name,
                priority,
                existing = existing.priority,
                "keeping higher-priority plugin"
            );
            return false;
        }
        tracing::debug!(format = %name, priority, "registered format plugin");
        self.plugins
            .insert(name, RegisteredPlugin { plugin, priority });
        true
    }

    /// Register `plugin` with the priority it reports.
    pub fn register_plugin(&mut self, plugin: Arc<dyn FormatPlugin>) -> bool {
        let priority = plugin.priority();
        self.register(plugin, priority)
    }

    /// Get the plugin for a format.
    pub fn get(&self, format: &str) -> Option<Arc<dyn FormatPlugin>> {
        self.plugins.get(format).map(|p| Arc::clone(&p.plugin))
    }

    /// Priority the current plugin for `format` was registered with.
    pub fn priority_of(&self, format: &str) -> Option<u8> {
        self.plugins.get(format).map(|p| p.priority)
    }

    /// Registered format names, sorted.
    pub fn format_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for name in self.format_names() {
            map.entry(&name, &self.plugins[name].priority);
        }
        map.finish()
    }
}
