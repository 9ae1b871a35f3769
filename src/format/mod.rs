use std::rc::Rc;

use tracing::{trace, warn};

use crate::config::{Config, FormatOptions};
use crate::errors::FormatError;
use crate::value::Value;

pub mod builtins;

/// Rendered for a container that is already being printed further up.
pub const CIRCULAR: &str = "[<circular>]";

/// Outcome of one formatter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatResult {
    /// Final rendering; stop here.
    Ok,
    /// Candidate rendering; a later formatter may still replace it.
    Continue,
    /// Not applicable to this value.
    Skip,
    /// Abort formatting and surface the captured error.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormattedValue {
    pub res: FormatResult,
    pub value: Option<String>,
    pub err: Option<FormatError>,
}

impl FormattedValue {
    pub fn ok(value: impl Into<String>) -> Self {
        Self {
            res: FormatResult::Ok,
            value: Some(value.into()),
            err: None,
        }
    }

    pub fn next(value: impl Into<String>) -> Self {
        Self {
            res: FormatResult::Continue,
            value: Some(value.into()),
            err: None,
        }
    }

    pub fn skip() -> Self {
        Self {
            res: FormatResult::Skip,
            value: None,
            err: None,
        }
    }

    pub fn failed(err: FormatError) -> Self {
        Self {
            res: FormatResult::Failed,
            value: None,
            err: Some(err),
        }
    }
}

/// A pluggable value renderer. Formatters hold no per-call state; nested
/// values are rendered by calling back into [`FormatCtx::format`].
pub trait Formatter {
    fn name(&self) -> &str;
    /// `None` is treated like [`FormatResult::Skip`].
    fn value(&self, ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue>;
}

impl<T: Formatter + ?Sized> Formatter for Rc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn value(&self, ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        (**self).value(ctx, value)
    }
}

/// Adapter turning a closure into a [`Formatter`].
pub struct FnFormatter<F> {
    name: String,
    f: F,
}

impl<F> Formatter for FnFormatter<F>
where
    F: Fn(&mut FormatCtx<'_>, &Value) -> Option<FormattedValue>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self, ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        (self.f)(ctx, value)
    }
}

pub fn formatter_fn<F>(name: impl Into<String>, f: F) -> Rc<dyn Formatter>
where
    F: Fn(&mut FormatCtx<'_>, &Value) -> Option<FormattedValue> + 'static,
{
    Rc::new(FnFormatter {
        name: name.into(),
        f,
    })
}

/// Recursion state of one top-level `format` call.
pub struct FormatCtx<'a> {
    formatters: Vec<&'a dyn Formatter>,
    options: &'a FormatOptions,
    /// Containers currently being rendered, outermost first.
    path: Vec<usize>,
}

impl<'a> FormatCtx<'a> {
    /// Custom formatters from `cfg` followed by the built-ins.
    pub fn new(cfg: &'a Config) -> Self {
        let mut formatters: Vec<&'a dyn Formatter> = Vec::new();
        for custom in &cfg.formatters {
            formatters.push(&**custom);
        }
        for builtin in builtins::defaults() {
            formatters.push(builtin);
        }
        Self::with_formatters(&cfg.format, formatters)
    }

    /// An explicit formatter list; the catch-all still backs it.
    pub fn with_formatters(options: &'a FormatOptions, formatters: Vec<&'a dyn Formatter>) -> Self {
        Self {
            formatters,
            options,
            path: Vec::new(),
        }
    }

    pub fn options(&self) -> &FormatOptions {
        self.options
    }

    /// Number of containers enclosing the value being rendered.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Render `value`. Containers already on the current path render as
    /// [`CIRCULAR`]; containers past `max_depth` are elided.
    pub fn format(&mut self, value: &Value) -> Result<String, FormatError> {
        let Some(id) = value.container_id() else {
            return self.run(value);
        };
        if self.path.contains(&id) {
            return Ok(CIRCULAR.to_string());
        }
        if self.path.len() >= self.options.max_depth {
            return Ok(builtins::elided(value));
        }
        self.path.push(id);
        let out = self.run(value);
        self.path.pop();
        out
    }

    fn run(&mut self, value: &Value) -> Result<String, FormatError> {
        let mut best: Option<String> = None;
        let formatters = self.formatters.clone();
        for formatter in formatters {
            let Some(result) = formatter.value(self, value) else {
                continue;
            };
            match result.res {
                FormatResult::Ok => return Ok(result.value.or(best).unwrap_or_default()),
                FormatResult::Continue => {
                    trace!(formatter = formatter.name(), "candidate rendering");
                    if result.value.is_some() {
                        best = result.value;
                    }
                }
                FormatResult::Skip => {}
                FormatResult::Failed => {
                    let err = result.err.unwrap_or_else(|| FormatError::Failed {
                        formatter: formatter.name().to_string(),
                        message: "no error captured".to_string(),
                    });
                    warn!(formatter = formatter.name(), error = %err, "formatter failed");
                    return Err(err);
                }
            }
        }
        Ok(best.unwrap_or_else(|| builtins::tag_description(value)))
    }
}

/// Render `value` with the formatters configured in `cfg`.
pub fn format_value(cfg: &Config, value: &Value) -> Result<String, FormatError> {
    FormatCtx::new(cfg).format(value)
}
