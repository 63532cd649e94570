//! Invocation-scoped configuration.

use std::fmt;
use std::sync::Arc;

use quill_config::{Config, ConfigError};

use crate::error::{ContextKey, MissingContextError};
use crate::resolver::{RepoRef, Resolver};
use crate::whitelist::{MAIN, Whitelist};

/// Read-only configuration for one pipeline run.
///
/// Every field is optional; getters apply the documented defaults. Filters
/// never mutate a context.
#[derive(Clone, Default)]
pub struct Context {
    /// Base URL for generated links (default `/`).
    pub base_url: Option<String>,
    /// Entity lookup capability.
    pub resolver: Option<Arc<dyn Resolver>>,
    /// Repository that bare `#123` and SHA references resolve against.
    pub repository: Option<RepoRef>,
    /// Login of the viewing user; mentions of it are linked but not recorded.
    pub current_user: Option<String>,
    /// Sanitizer policy (default [`Whitelist::main`]).
    pub whitelist: Option<Arc<Whitelist>>,
    /// Username sub-pattern override.
    pub username_pattern: Option<String>,
    /// Issue id sub-pattern override.
    pub issueid_pattern: Option<String>,
    /// Bare URL linking (default `true`).
    pub autolink: Option<bool>,
    /// Link target for the `@mention` keyword.
    pub info_url: Option<String>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build pipeline defaults from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the custom sanitize profile has no
    /// `[sanitize.custom]` section.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let whitelist = Whitelist::from_config(&config.sanitize).ok_or_else(|| {
            ConfigError::Validation("sanitize.custom is required for the custom profile".to_owned())
        })?;
        Ok(Self {
            base_url: Some(config.pipeline.base_url.clone()),
            info_url: config.pipeline.info_url.clone(),
            autolink: Some(config.pipeline.autolink),
            username_pattern: config.patterns.username.clone(),
            issueid_pattern: config.patterns.issue_id.clone(),
            whitelist: Some(Arc::new(whitelist)),
            ..Self::default()
        })
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the repository.
    #[must_use]
    pub fn with_repository(mut self, repository: RepoRef) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Set the current user.
    #[must_use]
    pub fn with_current_user(mut self, login: impl Into<String>) -> Self {
        self.current_user = Some(login.into());
        self
    }

    /// Set the sanitizer policy.
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = Some(Arc::new(whitelist));
        self
    }

    /// Override the username sub-pattern.
    #[must_use]
    pub fn with_username_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.username_pattern = Some(pattern.into());
        self
    }

    /// Override the issue id sub-pattern.
    #[must_use]
    pub fn with_issueid_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.issueid_pattern = Some(pattern.into());
        self
    }

    /// Enable or disable bare URL linking.
    #[must_use]
    pub fn with_autolink(mut self, autolink: bool) -> Self {
        self.autolink = Some(autolink);
        self
    }

    /// Set the `@mention` keyword link target.
    #[must_use]
    pub fn with_info_url(mut self, info_url: impl Into<String>) -> Self {
        self.info_url = Some(info_url.into());
        self
    }

    /// Base URL, defaulting to `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or("/")
    }

    /// Sanitizer policy, defaulting to the main profile.
    #[must_use]
    pub fn whitelist(&self) -> &Whitelist {
        self.whitelist.as_deref().unwrap_or(&MAIN)
    }

    /// Whether bare URLs are linked.
    #[must_use]
    pub fn autolink(&self) -> bool {
        self.autolink.unwrap_or(true)
    }

    /// Resolver, if configured.
    #[must_use]
    pub fn resolver(&self) -> Option<&dyn Resolver> {
        self.resolver.as_deref()
    }

    /// Resolver, or an error naming `filter`.
    ///
    /// # Errors
    ///
    /// Returns `MissingContextError` if no resolver is configured.
    pub fn require_resolver(
        &self,
        filter: &'static str,
    ) -> Result<&dyn Resolver, MissingContextError> {
        self.resolver().ok_or(MissingContextError {
            filter,
            key: ContextKey::Resolver,
        })
    }

    /// Merge per-call `overrides` with these defaults.
    ///
    /// Keys set in both take the default unless `allow_override` is set.
    #[must_use]
    pub fn merged(&self, overrides: &Self, allow_override: bool) -> Self {
        let (first, second) = if allow_override {
            (overrides, self)
        } else {
            (self, overrides)
        };
        Self {
            base_url: first.base_url.clone().or_else(|| second.base_url.clone()),
            resolver: first.resolver.clone().or_else(|| second.resolver.clone()),
            repository: first.repository.clone().or_else(|| second.repository.clone()),
            current_user: first
                .current_user
                .clone()
                .or_else(|| second.current_user.clone()),
            whitelist: first.whitelist.clone().or_else(|| second.whitelist.clone()),
            username_pattern: first
                .username_pattern
                .clone()
                .or_else(|| second.username_pattern.clone()),
            issueid_pattern: first
                .issueid_pattern
                .clone()
                .or_else(|| second.issueid_pattern.clone()),
            autolink: first.autolink.or(second.autolink),
            info_url: first.info_url.clone().or_else(|| second.info_url.clone()),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("base_url", &self.base_url)
            .field("resolver", &self.resolver.as_ref().map(|_| "<resolver>"))
            .field("repository", &self.repository)
            .field("current_user", &self.current_user)
            .field("whitelist", &self.whitelist.as_ref().map(|_| "<whitelist>"))
            .field("username_pattern", &self.username_pattern)
            .field("issueid_pattern", &self.issueid_pattern)
            .field("autolink", &self.autolink)
            .field("info_url", &self.info_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mock::MemoryResolver;

    #[test]
    fn test_defaults() {
        let context = Context::new();

        assert_eq!(context.base_url(), "/");
        assert!(context.autolink());
        assert!(context.resolver().is_none());
        assert!(context.whitelist().allows_element("table"));
    }

    #[test]
    fn test_require_resolver() {
        let err = Context::new()
            .require_resolver("IssueFilter")
            .err()
            .expect("expected missing resolver error");
        assert_eq!(err.key, ContextKey::Resolver);
        assert_eq!(err.filter, "IssueFilter");

        let context = Context::new().with_resolver(Arc::new(MemoryResolver::new()));
        assert!(context.require_resolver("IssueFilter").is_ok());
    }

    #[test]
    fn test_merged_defaults_win() {
        let defaults = Context::new().with_base_url("/app/");
        let call = Context::new()
            .with_base_url("/evil/")
            .with_current_user("kneath");

        let merged = defaults.merged(&call, false);

        assert_eq!(merged.base_url(), "/app/");
        assert_eq!(merged.current_user.as_deref(), Some("kneath"));
    }

    #[test]
    fn test_merged_override_allowed() {
        let defaults = Context::new().with_base_url("/app/").with_autolink(false);
        let call = Context::new().with_base_url("/other/");

        let merged = defaults.merged(&call, true);

        assert_eq!(merged.base_url(), "/other/");
        assert!(!merged.autolink());
    }

    #[test]
    fn test_from_config() {
        let config = Config::from_toml_str(
            r#"
[pipeline]
base_url = "https://example.com/"
autolink = false

[patterns]
username = "[a-z]+"

[sanitize]
profile = "limited"
"#,
        )
        .unwrap();

        let context = Context::from_config(&config).unwrap();

        assert_eq!(context.base_url(), "https://example.com/");
        assert!(!context.autolink());
        assert_eq!(context.username_pattern.as_deref(), Some("[a-z]+"));
        assert!(!context.whitelist().allows_element("table"));
    }

    #[test]
    fn test_debug_hides_resolver() {
        let context = Context::new().with_resolver(Arc::new(MemoryResolver::new()));
        assert!(format!("{context:?}").contains("<resolver>"));
    }
}
