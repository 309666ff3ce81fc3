use std::sync::OnceLock;

use crate::constants::DEFAULT_COMPARE_DEPTH;

/// Store used for the attributes of newly created instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceDictKind {
    /// [`InstanceDict`](crate::object::dict::InstanceDict): compact slots
    /// with generic fallback.
    #[default]
    Compact,
    /// [`FieldIdDict`](crate::object::dict::FieldIdDict) from the start.
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Nested comparisons allowed on one call stack before
    /// `RecursionExceeded`.
    pub compare_depth_limit: usize,
    pub instance_dict: InstanceDictKind,
    /// Emit `trace!` events for each comparison-protocol step.
    pub trace_compare: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            compare_depth_limit: DEFAULT_COMPARE_DEPTH,
            instance_dict: InstanceDictKind::Compact,
            trace_compare: false,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `MOLT_OLDCLASS_COMPARE_DEPTH`,
    /// `MOLT_OLDCLASS_INSTANCE_DICT` and `MOLT_TRACE_OLDCLASS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(depth) = lookup("MOLT_OLDCLASS_COMPARE_DEPTH")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|depth| *depth > 0)
        {
            config.compare_depth_limit = depth;
        }
        if let Some(kind) = lookup("MOLT_OLDCLASS_INSTANCE_DICT") {
            match kind.trim() {
                "generic" => config.instance_dict = InstanceDictKind::Generic,
                "compact" => config.instance_dict = InstanceDictKind::Compact,
                _ => {}
            }
        }
        config.trace_compare = matches!(lookup("MOLT_TRACE_OLDCLASS").as_deref(), Some("1"));
        config
    }
}

/// Process-wide config read from the environment once.
pub fn global_config() -> &'static RuntimeConfig {
    static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();
    CONFIG.get_or_init(RuntimeConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        assert_eq!(config_with(&[]), RuntimeConfig::default());
    }

    #[test]
    fn env_overrides() {
        let config = config_with(&[
            ("MOLT_OLDCLASS_COMPARE_DEPTH", "64"),
            ("MOLT_OLDCLASS_INSTANCE_DICT", "generic"),
            ("MOLT_TRACE_OLDCLASS", "1"),
        ]);
        assert_eq!(config.compare_depth_limit, 64);
        assert_eq!(config.instance_dict, InstanceDictKind::Generic);
        assert!(config.trace_compare);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = config_with(&[
            ("MOLT_OLDCLASS_COMPARE_DEPTH", "0"),
            ("MOLT_OLDCLASS_INSTANCE_DICT", "weird"),
            ("MOLT_TRACE_OLDCLASS", "yes"),
        ]);
        assert_eq!(config, RuntimeConfig::default());
    }
}
