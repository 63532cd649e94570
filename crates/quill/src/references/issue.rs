//! `#123` and `owner/repo#123` issue references.

use std::sync::LazyLock;

use regex::Regex;

use super::mention::USERNAME_PATTERN;
use super::{anchor, join_url, pattern, reference_span, replace_references, rewrite_text_nodes};
use crate::context::Context;
use crate::error::{ContextKey, MissingContextError, PipelineError};
use crate::filter::Filter;
use crate::resolver::RepoRef;
use crate::result::{Markup, PipelineResult, Reference};

/// Default issue id sub-pattern.
const ISSUE_ID_PATTERN: &str = "[0-9]+";

/// Closing keyword directly before a reference.
static CLOSES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:close[sd]|fix(?:e[sd])|resolve[sd]):?\s+$")
        .expect("invalid closing keyword regex")
});

/// Links issue references and records the issues.
///
/// `owner/repo#123` resolves in that repository. A bare `#123` resolves in
/// the context `repository`, or without one when none is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct IssueFilter;

impl Filter for IssueFilter {
    fn name(&self) -> &'static str {
        "IssueFilter"
    }

    fn validate(&self, context: &Context) -> Result<(), MissingContextError> {
        context.require_resolver(self.name()).map(|_| ())
    }

    fn apply(
        &self,
        input: Markup,
        context: &Context,
        result: &mut PipelineResult,
    ) -> Result<Markup, PipelineError> {
        let resolver = context.require_resolver(self.name())?;
        let issue_id = context
            .issueid_pattern
            .as_deref()
            .unwrap_or(ISSUE_ID_PATTERN);
        let source = format!(
            r"(?i)(?P<lead>^|\W)(?:(?P<owner>{USERNAME_PATTERN})/(?P<repo>[\w.-]+))?#(?P<id>{issue_id})"
        );
        let regex = pattern::compiled(&source, ContextKey::IssueidPattern)?;
        let base_url = context.base_url();

        let mut fragment = input.into_fragment()?;
        let rewritten = rewrite_text_nodes(
            &mut fragment,
            |text| text.contains('#'),
            |html| {
                replace_references(html, &regex, |caps| {
                    let qualified = match (caps.name("owner"), caps.name("repo")) {
                        (Some(owner), Some(name)) => {
                            Some(RepoRef::new(owner.as_str(), name.as_str()))
                        }
                        _ => None,
                    };
                    let repository = qualified.as_ref().or(context.repository.as_ref());
                    let id = &caps["id"];

                    let Some(issue) = resolver.find_issue(repository, id)? else {
                        return Ok(None);
                    };

                    let path = match repository {
                        Some(repo) => format!("{}/{}/issues/{id}", repo.owner, repo.name),
                        None => id.to_owned(),
                    };
                    let text = reference_span(caps);
                    let start = caps.name("lead").map_or(0, |m| m.end());
                    let closes = CLOSES_RE.is_match(&html[..start]);

                    result.add_issue(Reference::new(text, issue).closing(closes));
                    Ok(Some(anchor(&join_url(base_url, &path), "issue-mention", text)))
                })
            },
        )?;

        tracing::debug!(filter = self.name(), rewritten, "Linked issue references");
        Ok(Markup::Tree(fragment))
    }
}
