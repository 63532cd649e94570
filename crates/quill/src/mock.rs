//! In-memory resolver for testing.
//!
//! Provides [`MemoryResolver`] for exercising reference filters without a
//! real backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::resolver::{Commit, Issue, RepoRef, Resolver, ResolverError, Team, User};

/// Resolver backed by in-memory tables.
///
/// # Example
///
/// ```ignore
/// use quill::MemoryResolver;
///
/// let resolver = MemoryResolver::new()
///     .with_user("kneath")
///     .with_issue(None, "1234")
///     .with_commit(None, "abc1234abc1234abc1234abc1234abc1234abcd");
/// ```
#[derive(Debug, Default)]
pub struct MemoryResolver {
    users: HashMap<String, User>,
    issues: HashMap<(Option<RepoRef>, String), Issue>,
    commits: Vec<Commit>,
    teams: HashSet<(String, String)>,
    failing: bool,
    commit_lookups: AtomicUsize,
}

impl MemoryResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user. Lookups ignore ASCII case.
    #[must_use]
    pub fn with_user(mut self, login: impl Into<String>) -> Self {
        let login = login.into();
        self.users
            .insert(login.to_ascii_lowercase(), User { login });
        self
    }

    /// Add an issue, optionally scoped to a repository.
    #[must_use]
    pub fn with_issue(mut self, repository: Option<RepoRef>, id: impl Into<String>) -> Self {
        let id = id.into();
        self.issues.insert(
            (repository.clone(), id.clone()),
            Issue { id, repository },
        );
        self
    }

    /// Add a commit by full SHA, optionally scoped to a repository.
    #[must_use]
    pub fn with_commit(mut self, repository: Option<RepoRef>, sha: impl Into<String>) -> Self {
        self.commits.push(Commit {
            sha: sha.into().to_ascii_lowercase(),
            repository,
        });
        self
    }

    /// Add a team.
    #[must_use]
    pub fn with_team(mut self, org: impl Into<String>, slug: impl Into<String>) -> Self {
        self.teams.insert((org.into(), slug.into()));
        self
    }

    /// Make every lookup fail with a [`ResolverError`].
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of `find_commit` calls served so far.
    #[must_use]
    pub fn commit_lookups(&self) -> usize {
        self.commit_lookups.load(Ordering::Relaxed)
    }

    fn check(&self, what: &str) -> Result<(), ResolverError> {
        if self.failing {
            return Err(ResolverError::new(format!("{what} lookup failed")));
        }
        Ok(())
    }
}

impl Resolver for MemoryResolver {
    fn find_user_by_login(&self, login: &str) -> Result<Option<User>, ResolverError> {
        self.check("user")?;
        Ok(self.users.get(&login.to_ascii_lowercase()).cloned())
    }

    fn find_issue(
        &self,
        repository: Option<&RepoRef>,
        id: &str,
    ) -> Result<Option<Issue>, ResolverError> {
        self.check("issue")?;
        Ok(self
            .issues
            .get(&(repository.cloned(), id.to_owned()))
            .cloned())
    }

    fn find_commit(
        &self,
        repository: Option<&RepoRef>,
        sha: &str,
    ) -> Result<Option<Commit>, ResolverError> {
        self.commit_lookups.fetch_add(1, Ordering::Relaxed);
        self.check("commit")?;
        let sha = sha.to_ascii_lowercase();
        Ok(self
            .commits
            .iter()
            .find(|c| c.repository.as_ref() == repository && c.sha.starts_with(&sha))
            .cloned())
    }

    fn find_team(&self, org: &str, slug: &str) -> Result<Option<Team>, ResolverError> {
        self.check("team")?;
        Ok(self
            .teams
            .contains(&(org.to_owned(), slug.to_owned()))
            .then(|| Team {
                org: org.to_owned(),
                slug: slug.to_owned(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_find_user_case_insensitive() {
        let resolver = MemoryResolver::new().with_user("Kneath");

        let user = resolver.find_user_by_login("kneath").unwrap().unwrap();
        assert_eq!(user.login, "Kneath");
        assert!(resolver.find_user_by_login("nobody").unwrap().is_none());
    }

    #[test]
    fn test_find_issue_scoped_to_repository() {
        let repo = RepoRef::new("rails", "rails");
        let resolver = MemoryResolver::new().with_issue(Some(repo.clone()), "12");

        assert!(resolver.find_issue(Some(&repo), "12").unwrap().is_some());
        assert!(resolver.find_issue(None, "12").unwrap().is_none());
    }

    #[test]
    fn test_find_commit_by_prefix_counts_lookups() {
        let resolver =
            MemoryResolver::new().with_commit(None, "abc1234def5678abc1234def5678abc1234def56");

        let commit = resolver.find_commit(None, "ABC1234").unwrap().unwrap();
        assert_eq!(commit.sha, "abc1234def5678abc1234def5678abc1234def56");
        assert!(resolver.find_commit(None, "fff0000").unwrap().is_none());
        assert_eq!(resolver.commit_lookups(), 2);
    }

    #[test]
    fn test_failing_resolver() {
        let resolver = MemoryResolver::new().with_team("github", "ops").failing();

        let err = resolver.find_team("github", "ops").unwrap_err();
        assert_eq!(err.to_string(), "team lookup failed");
    }
}
