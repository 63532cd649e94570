//! Filter input/output and the per-run result accumulator.

use quill_dom::{Fragment, ParseError, escape_text};

use crate::filters::TocEntry;
use crate::resolver::{Commit, Issue, Team};

/// Markup flowing between filters: a string or a parsed tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Markup {
    /// Raw markup or source text.
    Text(String),
    /// Parsed tree.
    Tree(Fragment),
}

impl Markup {
    /// Parse into a tree if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if text markup cannot be parsed.
    pub fn into_fragment(self) -> Result<Fragment, ParseError> {
        match self {
            Self::Text(html) => Fragment::parse(&html),
            Self::Tree(fragment) => Ok(fragment),
        }
    }

    /// Serialize into a markup string if needed.
    #[must_use]
    pub fn into_html(self) -> String {
        match self {
            Self::Text(html) => html,
            Self::Tree(fragment) => fragment.to_html(),
        }
    }

    /// Wrap plain text as escaped markup.
    #[must_use]
    pub fn escaped(text: &str) -> Self {
        Self::Text(escape_text(text))
    }
}

impl From<String> for Markup {
    fn from(html: String) -> Self {
        Self::Text(html)
    }
}

impl From<&str> for Markup {
    fn from(html: &str) -> Self {
        Self::Text(html.to_owned())
    }
}

impl From<Fragment> for Markup {
    fn from(fragment: Fragment) -> Self {
        Self::Tree(fragment)
    }
}

/// A resolved in-text reference.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reference<T> {
    /// Identifier as captured from the text (e.g. `#12`, `rails/rails#12`).
    pub identifier: String,
    /// Resolved entity.
    pub entity: T,
    /// Whether a closing keyword (`fixes`, `closes`, ...) preceded the reference.
    pub closes: bool,
}

impl<T> Reference<T> {
    /// Create a reference without a closing keyword.
    #[must_use]
    pub fn new(identifier: impl Into<String>, entity: T) -> Self {
        Self {
            identifier: identifier.into(),
            entity,
            closes: false,
        }
    }

    /// Mark the reference as closing its target.
    #[must_use]
    pub fn closing(mut self, closes: bool) -> Self {
        self.closes = closes;
        self
    }
}

/// Accumulated output of one pipeline run.
///
/// Reference lists are deduplicated by entity identity and keep the order of
/// first appearance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineResult {
    /// Final filter output.
    pub output: Option<Markup>,
    /// Mentioned user logins.
    pub mentioned_usernames: Vec<String>,
    /// Mentioned teams.
    pub mentioned_teams: Vec<Reference<Team>>,
    /// Referenced commits.
    pub commits: Vec<Reference<Commit>>,
    /// Referenced issues.
    pub issues: Vec<Reference<Issue>>,
    /// Headings collected by the table of contents filter.
    pub table_of_contents: Vec<TocEntry>,
}

impl PipelineResult {
    /// Create an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mentioned login. Returns `false` if already recorded.
    pub fn add_username(&mut self, login: &str) -> bool {
        if self
            .mentioned_usernames
            .iter()
            .any(|l| l.eq_ignore_ascii_case(login))
        {
            return false;
        }
        self.mentioned_usernames.push(login.to_owned());
        true
    }

    /// Record a team mention. Returns `false` if already recorded.
    pub fn add_team(&mut self, reference: Reference<Team>) -> bool {
        push_unique(&mut self.mentioned_teams, reference, |a, b| a == b)
    }

    /// Record a commit reference. Returns `false` if already recorded.
    pub fn add_commit(&mut self, reference: Reference<Commit>) -> bool {
        push_unique(&mut self.commits, reference, |a, b| {
            a.sha == b.sha && a.repository == b.repository
        })
    }

    /// Record an issue reference. Returns `false` if already recorded.
    pub fn add_issue(&mut self, reference: Reference<Issue>) -> bool {
        push_unique(&mut self.issues, reference, |a, b| a == b)
    }

    /// Final output as a markup string.
    #[must_use]
    pub fn output_html(&self) -> Option<String> {
        self.output.clone().map(Markup::into_html)
    }
}

fn push_unique<T>(
    list: &mut Vec<Reference<T>>,
    reference: Reference<T>,
    same: impl Fn(&T, &T) -> bool,
) -> bool {
    if list.iter().any(|r| same(&r.entity, &reference.entity)) {
        return false;
    }
    list.push(reference);
    true
}
