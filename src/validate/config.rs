//! Validator configuration.

use std::fmt;
use std::sync::Arc;

use crate::constraint::ValueRegistry;
use crate::diag::DEFAULT_MAX_ISSUES;

/// Frozen options for a [`super::Validator`].
#[derive(Clone)]
pub struct Config {
    /// Sink for debug-level "name normalized" events. `None` logs to the
    /// ambient `tracing` subscriber.
    pub logger: Option<tracing::Dispatch>,
    /// Disable ASCII case folding when matching input keys to declared names.
    pub strict_property_names: bool,
    pub allow_unknown_fields: bool,
    /// Non-positive values fall back to the default of 100.
    pub max_issues_per_instance: i64,
    /// Recognises custom scalar types during constraint checking.
    pub value_registry: Option<Arc<dyn ValueRegistry>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logger: None,
            strict_property_names: false,
            allow_unknown_fields: false,
            max_issues_per_instance: DEFAULT_MAX_ISSUES as i64,
            value_registry: None,
        }
    }
}

impl Config {
    /// Strict names, unknown fields rejected.
    pub fn recommended() -> Self {
        Self { strict_property_names: true, allow_unknown_fields: false, ..Self::default() }
    }

    pub fn with_logger(mut self, dispatch: tracing::Dispatch) -> Self {
        self.logger = Some(dispatch);
        self
    }

    pub fn with_strict_property_names(mut self, strict: bool) -> Self {
        self.strict_property_names = strict;
        self
    }

    pub fn with_allow_unknown_fields(mut self, allow: bool) -> Self {
        self.allow_unknown_fields = allow;
        self
    }

    pub fn with_max_issues_per_instance(mut self, max: i64) -> Self {
        self.max_issues_per_instance = max;
        self
    }

    pub fn with_value_registry(mut self, registry: Arc<dyn ValueRegistry>) -> Self {
        self.value_registry = Some(registry);
        self
    }

    pub fn max_issues(&self) -> usize {
        usize::try_from(self.max_issues_per_instance)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_ISSUES)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("logger", &self.logger.is_some())
            .field("strict_property_names", &self.strict_property_names)
            .field("allow_unknown_fields", &self.allow_unknown_fields)
            .field("max_issues_per_instance", &self.max_issues_per_instance)
            .field("value_registry", &self.value_registry.is_some())
            .finish()
    }
}
