//! `@org/team` mentions.

use super::mention::USERNAME_PATTERN;
use super::{anchor, join_url, pattern, reference_span, replace_references, rewrite_text_nodes};
use crate::context::Context;
use crate::error::{ContextKey, MissingContextError, PipelineError};
use crate::filter::Filter;
use crate::result::{Markup, PipelineResult, Reference};

const TEAM_SLUG_PATTERN: &str = "[a-z0-9][a-z0-9_-]*";

/// Links `@org/team` to the team page and records the team.
#[derive(Clone, Copy, Debug, Default)]
pub struct TeamFilter;

impl Filter for TeamFilter {
    fn name(&self) -> &'static str {
        "TeamFilter"
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
        let org = context
            .username_pattern
            .as_deref()
            .unwrap_or(USERNAME_PATTERN);
        let source = format!(r"(?i)(?P<lead>^|\W)@(?P<org>{org})/(?P<slug>{TEAM_SLUG_PATTERN})");
        let regex = pattern::compiled(&source, ContextKey::UsernamePattern)?;
        let base_url = context.base_url();

        let mut fragment = input.into_fragment()?;
        let rewritten = rewrite_text_nodes(
            &mut fragment,
            |text| text.contains('@') && text.contains('/'),
            |html| {
                replace_references(html, &regex, |caps| {
                    let Some(team) = resolver.find_team(&caps["org"], &caps["slug"])? else {
                        return Ok(None);
                    };
                    let text = reference_span(caps);
                    let path = format!("orgs/{}/teams/{}", team.org, team.slug);
                    let href = join_url(base_url, &path);
                    result.add_team(Reference::new(text, team));
                    Ok(Some(anchor(&href, "team-mention", text)))
                })
            },
        )?;

        tracing::debug!(filter = self.name(), rewritten, "Linked team mentions");
        Ok(Markup::Tree(fragment))
    }
}
