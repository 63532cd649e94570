//! Filter trait.
//!
//! A filter is a single-purpose transform over markup. Filters read the
//! [`Context`] and write only to the [`PipelineResult`]; each one can accept
//! either representation of [`Markup`] and returns whichever is natural for it.

use crate::context::Context;
use crate::error::{MissingContextError, PipelineError};
use crate::result::{Markup, PipelineResult};

/// Transform unit run by a [`Pipeline`](crate::Pipeline).
pub trait Filter: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Check that `context` carries every key this filter requires.
    ///
    /// # Errors
    ///
    /// Returns `MissingContextError` naming the first missing key.
    fn validate(&self, _context: &Context) -> Result<(), MissingContextError> {
        Ok(())
    }

    /// Transform `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing, pattern compilation or a collaborator fails.
    fn apply(
        &self,
        input: Markup,
        context: &Context,
        result: &mut PipelineResult,
    ) -> Result<Markup, PipelineError>;

    /// Validate `context`, then apply.
    ///
    /// # Errors
    ///
    /// Returns the validation error or the error from [`Filter::apply`].
    fn call(
        &self,
        input: Markup,
        context: &Context,
        result: &mut PipelineResult,
    ) -> Result<Markup, PipelineError> {
        self.validate(context)?;
        self.apply(input, context, result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ContextKey;
    use crate::mock::MemoryResolver;

    struct NeedsResolver;

    impl Filter for NeedsResolver {
        fn name(&self) -> &'static str {
            "NeedsResolver"
        }

        fn validate(&self, context: &Context) -> Result<(), MissingContextError> {
            context.require_resolver(self.name()).map(|_| ())
        }

        fn apply(
            &self,
            input: Markup,
            _context: &Context,
            _result: &mut PipelineResult,
        ) -> Result<Markup, PipelineError> {
            Ok(Markup::Text(input.into_html().to_uppercase()))
        }
    }

    #[test]
    fn test_call_validates_first() {
        let mut result = PipelineResult::new();
        let err = NeedsResolver
            .call("x".into(), &Context::new(), &mut result)
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::MissingContext(MissingContextError {
                key: ContextKey::Resolver,
                ..
            })
        ));
    }

    #[test]
    fn test_call_applies_when_valid() {
        let context = Context::new().with_resolver(Arc::new(MemoryResolver::new()));
        let mut result = PipelineResult::new();

        let output = NeedsResolver.call("x".into(), &context, &mut result).unwrap();
        assert_eq!(output, Markup::Text("X".to_owned()));
    }
}
