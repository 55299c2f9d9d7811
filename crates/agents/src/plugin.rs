//! Process-wide registry of loaded plugins.

use std::sync::{Arc, Mutex, OnceLock};

/// Metadata a plugin package announces when it is loaded.
pub trait Plugin: Send + Sync {
    fn title(&self) -> &str;
    fn version(&self) -> &str;
    fn package(&self) -> &str;
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Mutex<Vec<Arc<dyn Plugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a plugin with the same title is already present.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> bool {
        let mut plugins = match self.plugins.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if plugins.iter().any(|p| p.title() == plugin.title()) {
            tracing::debug!(title = plugin.title(), "Plugin already registered");
            return false;
        }
        tracing::info!(
            title = plugin.title(),
            version = plugin.version(),
            package = plugin.package(),
            "Registered plugin"
        );
        plugins.push(plugin);
        true
    }

    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        match self.plugins.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn find(&self, title: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins().into_iter().find(|p| p.title() == title)
    }
}

static REGISTRY: OnceLock<PluginRegistry> = OnceLock::new();

fn global() -> &'static PluginRegistry {
    REGISTRY.get_or_init(PluginRegistry::new)
}

pub fn register_plugin(plugin: Arc<dyn Plugin>) -> bool {
    global().register(plugin)
}

pub fn registered_plugins() -> Vec<Arc<dyn Plugin>> {
    global().plugins()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str);

    impl Plugin for Dummy {
        fn title(&self) -> &str {
            self.0
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn package(&self) -> &str {
            "turnkit-dummy"
        }
    }

    #[test]
    fn test_register_is_idempotent_by_title() {
        let registry = PluginRegistry::new();
        assert!(registry.register(Arc::new(Dummy("a"))));
        assert!(!registry.register(Arc::new(Dummy("a"))));
        assert!(registry.register(Arc::new(Dummy("b"))));
        assert_eq!(registry.plugins().len(), 2);
        assert_eq!(registry.find("b").unwrap().package(), "turnkit-dummy");
        assert!(registry.find("c").is_none());
    }
}
