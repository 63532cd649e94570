//! Entity lookup capability used by the reference filters.
//!
//! A [`Resolver`] translates identifiers found in text (`@login`, `#12`,
//! commit SHAs, `@org/team`) into entities. `Ok(None)` means "not found" and
//! leaves the text untouched; `Err` aborts the pipeline run.

use std::fmt;
use std::str::FromStr;

/// Repository addressed as `owner/name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RepoRef {
    /// Owning user or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Create a repository reference.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Error parsing a `owner/name` repository reference.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid repository reference `{0}`, expected `owner/name`")]
pub struct ParseRepoRefError(String);

impl FromStr for RepoRef {
    type Err = ParseRepoRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(ParseRepoRefError(s.to_owned())),
        }
    }
}

/// A user account.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    /// Canonical login.
    pub login: String,
}

/// An issue or pull request.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Issue {
    /// Issue identifier as written after `#`.
    pub id: String,
    /// Repository the issue belongs to, if known.
    pub repository: Option<RepoRef>,
}

/// A commit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Commit {
    /// Full commit SHA.
    pub sha: String,
    /// Repository the commit belongs to, if known.
    pub repository: Option<RepoRef>,
}

/// An organization team.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Team {
    /// Organization login.
    pub org: String,
    /// Team slug.
    pub slug: String,
}

/// Error raised by a [`Resolver`] backend.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ResolverError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ResolverError {
    /// Create a resolver error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Entity lookup backend.
///
/// Implementations must be safe to share across threads; a single resolver
/// typically serves many concurrent pipeline runs.
pub trait Resolver: Send + Sync {
    /// Find a user by login.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_user_by_login(&self, login: &str) -> Result<Option<User>, ResolverError>;

    /// Find an issue by id, within `repository` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_issue(
        &self,
        repository: Option<&RepoRef>,
        id: &str,
    ) -> Result<Option<Issue>, ResolverError>;

    /// Find a commit by full or abbreviated SHA, within `repository` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_commit(
        &self,
        repository: Option<&RepoRef>,
        sha: &str,
    ) -> Result<Option<Commit>, ResolverError>;

    /// Find a team by organization and slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_team(&self, org: &str, slug: &str) -> Result<Option<Team>, ResolverError>;
}
