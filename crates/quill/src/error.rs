//! Pipeline error types.

use std::fmt;

use crate::filters::ConvertError;
use crate::resolver::ResolverError;

/// Recognized context keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// Base URL for generated links.
    BaseUrl,
    /// Entity lookup capability.
    Resolver,
    /// Repository that bare references resolve against.
    Repository,
    /// Login of the viewing user.
    CurrentUser,
    /// Sanitizer policy.
    Whitelist,
    /// Override for the username sub-pattern.
    UsernamePattern,
    /// Override for the issue id sub-pattern.
    IssueidPattern,
    /// Bare URL linking switch.
    Autolink,
    /// Link target for the `@mention` keyword.
    InfoUrl,
}

impl ContextKey {
    /// Key name as used in configuration and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BaseUrl => "base_url",
            Self::Resolver => "resolver",
            Self::Repository => "repository",
            Self::CurrentUser => "current_user",
            Self::Whitelist => "whitelist",
            Self::UsernamePattern => "username_pattern",
            Self::IssueidPattern => "issueid_pattern",
            Self::Autolink => "autolink",
            Self::InfoUrl => "info_url",
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter was invoked without a context key it requires.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{filter} requires context key `{key}`")]
pub struct MissingContextError {
    /// Name of the filter that failed validation.
    pub filter: &'static str,
    /// The missing key.
    pub key: ContextKey,
}

/// Error aborting a pipeline run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// A filter is missing required context.
    #[error(transparent)]
    MissingContext(#[from] MissingContextError),

    /// Markup could not be parsed into a tree.
    #[error("Markup parse error: {0}")]
    Parse(#[from] quill_dom::ParseError),

    /// A context pattern override is not a valid regex.
    #[error("Invalid `{key}` pattern: {source}")]
    InvalidPattern {
        /// Context key holding the pattern.
        key: ContextKey,
        /// Regex compilation error.
        source: regex::Error,
    },

    /// A rewrite addressed a node that is no longer in the tree.
    #[error("No node at path {path} to replace")]
    StalePath {
        /// Path that failed to resolve.
        path: quill_dom::NodePath,
    },

    /// The resolver failed.
    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    /// The markup converter failed.
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Configuration could not be turned into pipeline defaults.
    #[error(transparent)]
    Config(#[from] quill_config::ConfigError),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_context_key_display() {
        assert_eq!(ContextKey::IssueidPattern.to_string(), "issueid_pattern");
        assert_eq!(ContextKey::BaseUrl.to_string(), "base_url");
    }

    #[test]
    fn test_missing_context_message() {
        let err = PipelineError::from(MissingContextError {
            filter: "MentionFilter",
            key: ContextKey::Resolver,
        });

        assert_eq!(err.to_string(), "MentionFilter requires context key `resolver`");
    }
}
