//! `@login` mentions.

use quill_dom::decode_entities;

use super::{anchor, join_url, pattern, reference_span, replace_references, rewrite_text_nodes};
use crate::context::Context;
use crate::error::{ContextKey, MissingContextError, PipelineError};
use crate::filter::Filter;
use crate::result::{Markup, PipelineResult};

/// Default username sub-pattern.
pub(crate) const USERNAME_PATTERN: &str = "[a-z0-9][a-z0-9-]*";

/// Keyword that links to `info_url` instead of a user.
const MENTION_KEYWORD: &str = "mention";

/// Source of the mention pattern for a username sub-pattern.
pub(crate) fn mention_pattern(username: &str) -> String {
    format!(r"(?i)(?P<lead>^|\W)@(?P<login>{username})")
}

/// Links `@login` to the user's page and records the login.
///
/// Mentions of the context `current_user` are linked but not recorded.
/// With `info_url` set, `@mention` links there instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct MentionFilter;

impl Filter for MentionFilter {
    fn name(&self) -> &'static str {
        "MentionFilter"
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
        let username = context
            .username_pattern
            .as_deref()
            .unwrap_or(USERNAME_PATTERN);
        let regex = pattern::compiled(&mention_pattern(username), ContextKey::UsernamePattern)?;
        let base_url = context.base_url();

        let mut fragment = input.into_fragment()?;
        let rewritten = rewrite_text_nodes(
            &mut fragment,
            |text| text.contains('@'),
            |html| {
                replace_references(html, &regex, |caps| {
                    let text = reference_span(caps);
                    let login = decode_entities(&caps["login"]);

                    if login.eq_ignore_ascii_case(MENTION_KEYWORD)
                        && let Some(info_url) = context.info_url.as_deref()
                    {
                        return Ok(Some(anchor(info_url, "mention-info", text)));
                    }

                    let Some(user) = resolver.find_user_by_login(&login)? else {
                        return Ok(None);
                    };
                    let is_current = context
                        .current_user
                        .as_deref()
                        .is_some_and(|current| current.eq_ignore_ascii_case(&user.login));
                    if !is_current {
                        result.add_username(&user.login);
                    }
                    Ok(Some(anchor(
                        &join_url(base_url, &user.login),
                        "user-mention",
                        text,
                    )))
                })
            },
        )?;

        tracing::debug!(filter = self.name(), rewritten, "Linked mentions");
        Ok(Markup::Tree(fragment))
    }
}
