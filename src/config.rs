//! Evaluation options shared by every context of a session.
//!
//! A `Config` is read-only once handed to a session; changing options means
//! building a new snapshot, which only contexts created afterwards observe.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::format::Formatter;

/// Post-processing applied once to a fully composed message.
pub type FinalizeFn = Rc<dyn Fn(&str) -> String>;

/// Limits applied by the formatter pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormatOptions {
    /// Container nesting rendered before eliding as `[...]` / `{...}`.
    pub max_depth: usize,
    /// Entries rendered per container before eliding the rest.
    pub max_items: usize,
    /// Characters of a string rendered before truncating.
    pub max_string_len: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_items: 100,
            max_string_len: 1024,
        }
    }
}

/// Serializable portion of [`Config`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigOptions {
    pub finalize: bool,
    pub format: FormatOptions,
}

#[derive(Clone, Default)]
pub struct Config {
    /// Run the finalize step over composed messages.
    pub finalize: bool,
    /// Replaces the default control-character escaping when set.
    pub finalize_fn: Option<FinalizeFn>,
    /// Custom formatters, tried in order before the built-ins.
    pub formatters: Vec<Rc<dyn Formatter>>,
    pub format: FormatOptions,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from a JSON document, e.g.
    /// `{"finalize": true, "format": {"maxDepth": 4}}`. Missing fields keep
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let opts: ConfigOptions = serde_json::from_str(json)?;
        Ok(Self::from(opts))
    }

    pub fn options(&self) -> ConfigOptions {
        ConfigOptions {
            finalize: self.finalize,
            format: self.format.clone(),
        }
    }

    pub fn with_formatter<F: Formatter + 'static>(mut self, formatter: F) -> Self {
        self.formatters.push(Rc::new(formatter));
        self
    }

    pub fn add_formatter(&mut self, formatter: Rc<dyn Formatter>) {
        self.formatters.push(formatter);
    }

    pub fn with_finalize(mut self, enabled: bool) -> Self {
        self.finalize = enabled;
        self
    }

    /// Enable finalization with a caller-supplied transform.
    pub fn with_finalize_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.finalize = true;
        self.finalize_fn = Some(Rc::new(f));
        self
    }
}

impl From<ConfigOptions> for Config {
    fn from(opts: ConfigOptions) -> Self {
        Self {
            finalize: opts.finalize,
            format: opts.format,
            ..Self::default()
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("finalize", &self.finalize)
            .field("finalize_fn", &self.finalize_fn.is_some())
            .field(
                "formatters",
                &self.formatters.iter().map(|fm| fm.name()).collect::<Vec<_>>(),
            )
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = Config::from_json(r#"{"finalize": true, "format": {"maxDepth": 2}}"#).unwrap();
        assert!(cfg.finalize);
        assert_eq!(cfg.format.max_depth, 2);
        assert_eq!(cfg.format.max_items, FormatOptions::default().max_items);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let err = Config::from_json("{finalize").unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn options_round_trip_through_serde() {
        let cfg = Config::new().with_finalize(true);
        let json = serde_json::to_string(&cfg.options()).unwrap();
        let back = Config::from_json(&json).unwrap();
        assert_eq!(back.options(), cfg.options());
    }
}
