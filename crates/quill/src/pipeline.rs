//! Ordered filter composition.

use quill_config::Config;
use quill_dom::Fragment;

use crate::context::Context;
use crate::error::PipelineError;
use crate::filter::Filter;
use crate::result::{Markup, PipelineResult};

/// An ordered list of filters plus default context.
///
/// A pipeline is immutable once built and can serve concurrent runs.
pub struct Pipeline {
    filters: Vec<Box<dyn Filter>>,
    defaults: Context,
    allow_context_override: bool,
}

impl Pipeline {
    /// Create a pipeline running `filters` in order.
    #[must_use]
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self {
            filters,
            defaults: Context::default(),
            allow_context_override: false,
        }
    }

    /// Create a pipeline with defaults taken from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not describe a usable
    /// sanitizer policy.
    pub fn with_config(
        filters: Vec<Box<dyn Filter>>,
        config: &Config,
    ) -> Result<Self, PipelineError> {
        Ok(Self::new(filters)
            .with_defaults(Context::from_config(config)?)
            .allow_context_override(config.pipeline.allow_context_override))
    }

    /// Set default context.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Context) -> Self {
        self.defaults = defaults;
        self
    }

    /// Let per-call context override defaults.
    #[must_use]
    pub fn allow_context_override(mut self, allow: bool) -> Self {
        self.allow_context_override = allow;
        self
    }

    /// Filter names in run order.
    pub fn filter_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.filters.iter().map(|f| f.name())
    }

    /// Run all filters over `input`.
    ///
    /// # Errors
    ///
    /// Returns the first validation, parse, pattern, resolver or conversion
    /// error; no partial result is returned.
    pub fn run(
        &self,
        input: impl Into<Markup>,
        context: &Context,
    ) -> Result<PipelineResult, PipelineError> {
        self.run_with_result(input, context, PipelineResult::default())
    }

    /// Run all filters, accumulating into an existing `result`.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub fn run_with_result(
        &self,
        input: impl Into<Markup>,
        context: &Context,
        mut result: PipelineResult,
    ) -> Result<PipelineResult, PipelineError> {
        let context = self.defaults.merged(context, self.allow_context_override);
        for filter in &self.filters {
            filter.validate(&context)?;
        }

        let mut markup = input.into();
        for filter in &self.filters {
            tracing::debug!(filter = filter.name(), "Applying filter");
            markup = filter.apply(markup, &context, &mut result)?;
        }
        result.output = Some(markup);
        Ok(result)
    }

    /// Run and return the output as a tree.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`]; also fails if text output cannot be parsed.
    pub fn to_fragment(
        &self,
        input: impl Into<Markup>,
        context: &Context,
    ) -> Result<Fragment, PipelineError> {
        let result = self.run(input, context)?;
        match result.output {
            Some(markup) => Ok(markup.into_fragment()?),
            None => Ok(Fragment::default()),
        }
    }

    /// Run and return the output as a markup string.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub fn to_html(
        &self,
        input: impl Into<Markup>,
        context: &Context,
    ) -> Result<String, PipelineError> {
        let result = self.run(input, context)?;
        Ok(result.output.map(Markup::into_html).unwrap_or_default())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("filters", &self.filter_names().collect::<Vec<_>>())
            .field("defaults", &self.defaults)
            .field("allow_context_override", &self.allow_context_override)
            .finish()
    }
}
