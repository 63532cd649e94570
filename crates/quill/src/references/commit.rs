//! Commit SHA and `sha...sha` range references.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{anchor, join_url, replace_references, rewrite_text_nodes};
use crate::context::Context;
use crate::error::{MissingContextError, PipelineError};
use crate::filter::Filter;
use crate::resolver::{Commit, RepoRef, Resolver};
use crate::result::{Markup, PipelineResult, Reference};

/// Maximum commit records created, and distinct SHAs looked up, by one
/// filter invocation.
pub const COMMIT_REFERENCE_LIMIT: usize = 10;

/// Length of abbreviated SHAs in link text.
const SHORT_SHA_LEN: usize = 7;

static COMMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<lead>^|[^\w@/])(?:(?P<owner>[a-z0-9][a-z0-9-]*)/(?P<repo>[\w.-]+)@)?(?P<sha>[0-9a-f]{7,40})(?:\.\.\.(?P<end>[0-9a-f]{7,40}))?",
    )
    .expect("invalid commit regex")
});

/// Links commit SHAs and ranges and records the commits.
///
/// At most [`COMMIT_REFERENCE_LIMIT`] records are created and at most as many
/// distinct SHAs are sent to the resolver per invocation; later SHAs stay
/// plain text. A range is linked only when both ends resolve.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommitFilter;

impl Filter for CommitFilter {
    fn name(&self) -> &'static str {
        "CommitFilter"
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
        let mut linker = CommitLinker {
            resolver: context.require_resolver(self.name())?,
            context,
            result,
            lookups: HashMap::new(),
            created: 0,
            capped: false,
        };

        let mut fragment = input.into_fragment()?;
        let rewritten = rewrite_text_nodes(
            &mut fragment,
            has_sha_run,
            |html| replace_references(html, &COMMIT_RE, |caps| linker.link(caps)),
        )?;

        tracing::debug!(
            filter = self.name(),
            rewritten,
            created = linker.created,
            "Linked commit references"
        );
        Ok(Markup::Tree(fragment))
    }
}

/// Per-invocation state: memoized lookups and the record cap.
struct CommitLinker<'a> {
    resolver: &'a dyn Resolver,
    context: &'a Context,
    result: &'a mut PipelineResult,
    lookups: HashMap<(Option<RepoRef>, String), Option<Commit>>,
    created: usize,
    capped: bool,
}

impl CommitLinker<'_> {
    fn link(&mut self, caps: &Captures<'_>) -> Result<Option<String>, PipelineError> {
        let qualified = match (caps.name("owner"), caps.name("repo")) {
            (Some(owner), Some(name)) => Some(RepoRef::new(owner.as_str(), name.as_str())),
            _ => None,
        };
        let repository = qualified.clone().or_else(|| self.context.repository.clone());
        let first = &caps["sha"];
        let second = caps.name("end").map(|m| m.as_str());

        let needed = if second.is_some() { 2 } else { 1 };
        if self.created + needed > COMMIT_REFERENCE_LIMIT {
            self.reach_limit();
            return Ok(None);
        }

        let Some(start) = self.lookup(repository.as_ref(), first)? else {
            return Ok(None);
        };
        let end = match second {
            Some(sha) => match self.lookup(repository.as_ref(), sha)? {
                Some(commit) => Some(commit),
                None => return Ok(None),
            },
            None => None,
        };

        let prefix = repository
            .as_ref()
            .map(|r| format!("{}/{}/", r.owner, r.name))
            .unwrap_or_default();
        let qualifier = qualified
            .as_ref()
            .map(|r| format!("{r}@"))
            .unwrap_or_default();

        let (path, text) = match (&end, second) {
            (Some(end), Some(sha)) => (
                format!("{prefix}compare/{}...{}", start.sha, end.sha),
                format!("{qualifier}{}...{}", short_sha(first), short_sha(sha)),
            ),
            _ => (
                format!("{prefix}commit/{}", start.sha),
                format!("{qualifier}{}", short_sha(first)),
            ),
        };

        self.record(format!("{qualifier}{first}"), start);
        if let (Some(end), Some(sha)) = (end, second) {
            self.record(format!("{qualifier}{sha}"), end);
        }

        Ok(Some(anchor(
            &join_url(self.context.base_url(), &path),
            "commit-link",
            &text,
        )))
    }

    fn lookup(
        &mut self,
        repository: Option<&RepoRef>,
        sha: &str,
    ) -> Result<Option<Commit>, PipelineError> {
        let key = (repository.cloned(), sha.to_ascii_lowercase());
        if let Some(cached) = self.lookups.get(&key) {
            return Ok(cached.clone());
        }
        if self.lookups.len() >= COMMIT_REFERENCE_LIMIT {
            self.reach_limit();
            return Ok(None);
        }
        let commit = self.resolver.find_commit(repository, sha)?;
        self.lookups.insert(key, commit.clone());
        Ok(commit)
    }

    fn reach_limit(&mut self) {
        if !self.capped {
            tracing::warn!(
                limit = COMMIT_REFERENCE_LIMIT,
                "Commit reference limit reached, leaving remaining SHAs unlinked"
            );
            self.capped = true;
        }
    }

    fn record(&mut self, identifier: String, commit: Commit) {
        if self.result.add_commit(Reference::new(identifier, commit)) {
            self.created += 1;
        }
    }
}

/// Whether `text` has a run of hex digits long enough to be a SHA.
fn has_sha_run(text: &str) -> bool {
    let mut run = 0;
    for b in text.bytes() {
        if b.is_ascii_hexdigit() {
            run += 1;
            if run >= SHORT_SHA_LEN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn short_sha(sha: &str) -> &str {
    sha.get(..SHORT_SHA_LEN).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mock::MemoryResolver;

    const ABC: &str = "abc1234aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const DEF: &str = "def5678bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn context_with(resolver: MemoryResolver) -> Context {
        Context::new().with_resolver(Arc::new(resolver))
    }

    fn context() -> Context {
        context_with(MemoryResolver::new().with_commit(None, ABC).with_commit(None, DEF))
    }

    fn run(markup: &str, context: &Context) -> (String, PipelineResult) {
        let mut result = PipelineResult::new();
        let output = CommitFilter
            .call(markup.into(), context, &mut result)
            .unwrap();
        (output.into_html(), result)
    }

    #[test]
    fn test_single_commit_linked() {
        let (html, result) = run("<p>fixed in abc1234.</p>", &context());

        assert_eq!(
            html,
            format!(r#"<p>fixed in <a href="/commit/{ABC}" class="commit-link">abc1234</a>.</p>"#)
        );
        assert_eq!(result.commits.len(), 1);
        assert_eq!(result.commits[0].entity.sha, ABC);
        assert_eq!(result.commits[0].identifier, "abc1234");
    }

    #[test]
    fn test_full_sha_shortened_in_text() {
        let (html, _) = run(&format!("<p>{DEF}</p>"), &context());

        assert_eq!(
            html,
            format!(r#"<p><a href="/commit/{DEF}" class="commit-link">def5678</a></p>"#)
        );
    }

    #[test]
    fn test_range_linked_when_both_resolve() {
        let (html, result) = run("abc1234...def5678", &context());

        assert_eq!(
            html,
            format!(
                r#"<a href="/compare/{ABC}...{DEF}" class="commit-link">abc1234...def5678</a>"#
            )
        );
        assert_eq!(html.matches("<a ").count(), 1);
        assert_eq!(result.commits.len(), 2);
    }

    #[test]
    fn test_range_untouched_when_one_side_missing() {
        let context = context_with(MemoryResolver::new().with_commit(None, ABC));
        let (html, result) = run("abc1234...def5678", &context);

        assert_eq!(html, "abc1234...def5678");
        assert!(result.commits.is_empty());
    }

    #[test]
    fn test_qualified_commit() {
        let rails = RepoRef::new("rails", "rails");
        let context = context_with(MemoryResolver::new().with_commit(Some(rails), ABC));
        let (html, result) = run("<p>see rails/rails@abc1234</p>", &context);

        assert_eq!(
            html,
            format!(
                r#"<p>see <a href="/rails/rails/commit/{ABC}" class="commit-link">rails/rails@abc1234</a></p>"#
            )
        );
        assert_eq!(result.commits[0].identifier, "rails/rails@abc1234");
    }

    #[test]
    fn test_repository_context_used_for_bare_sha() {
        let rails = RepoRef::new("rails", "rails");
        let context = context_with(MemoryResolver::new().with_commit(Some(rails.clone()), ABC))
            .with_repository(rails);
        let (html, _) = run("abc1234", &context);

        assert!(html.contains(&format!(r#"href="/rails/rails/commit/{ABC}""#)));
    }

    #[test]
    fn test_sha_inside_word_or_path_ignored() {
        let (html, _) = run("<p>xabc1234 /abc1234 abc1234z</p>", &context());

        assert_eq!(html, "<p>xabc1234 /abc1234 abc1234z</p>");
    }

    #[test]
    fn test_commit_in_code_untouched() {
        let (html, result) = run("<code>abc1234</code>", &context());

        assert_eq!(html, "<code>abc1234</code>");
        assert!(result.commits.is_empty());
    }

    #[test]
    fn test_lookups_memoized() {
        let resolver = Arc::new(MemoryResolver::new().with_commit(None, ABC));
        let context = Context::new().with_resolver(Arc::clone(&resolver) as Arc<dyn Resolver>);

        let (_, result) = run("<p>abc1234 abc1234</p><p>ABC1234 fff0000 fff0000</p>", &context);

        assert_eq!(resolver.commit_lookups(), 2);
        assert_eq!(result.commits.len(), 1);
    }

    #[test]
    fn test_record_limit() {
        let mut resolver = MemoryResolver::new();
        let mut text = String::from("<p>");
        for i in 0..12 {
            let sha = format!("{i:07x}{}", "0".repeat(33));
            resolver = resolver.with_commit(None, sha.clone());
            write!(text, "{} ", &sha[..7]).unwrap();
        }
        text.push_str("</p>");

        let (html, result) = run(&text, &context_with(resolver));

        assert_eq!(result.commits.len(), COMMIT_REFERENCE_LIMIT);
        assert_eq!(html.matches("commit-link").count(), COMMIT_REFERENCE_LIMIT);
        assert!(html.ends_with("000000a 000000b </p>"));
    }

    #[test]
    fn test_has_sha_run() {
        assert!(has_sha_run("fixed in abc1234."));
        assert!(!has_sha_run("a decade of cafe bad"));
        assert!(!has_sha_run("abc123 ffffff"));
    }

    #[test]
    fn test_unresolved_lookups_bounded() {
        let resolver = Arc::new(MemoryResolver::new().with_commit(None, ABC));
        let context = Context::new().with_resolver(Arc::clone(&resolver) as Arc<dyn Resolver>);
        let mut text = String::new();
        for i in 0..1000 {
            write!(text, "{:08x} ", 0xf000_0000_u32 + i).unwrap();
        }
        text.push_str("abc1234");

        let (html, result) = run(&text, &context);

        assert_eq!(resolver.commit_lookups(), COMMIT_REFERENCE_LIMIT);
        assert!(result.commits.is_empty());
        assert!(!html.contains("commit-link"));
    }

    #[test]
    fn test_range_not_split_at_limit() {
        let mut resolver = MemoryResolver::new().with_commit(None, ABC).with_commit(None, DEF);
        let mut text = String::new();
        for i in 0..9 {
            let sha = format!("{i:07x}{}", "1".repeat(33));
            resolver = resolver.with_commit(None, sha.clone());
            write!(text, "{} ", &sha[..7]).unwrap();
        }
        text.push_str("abc1234...def5678");

        let (html, result) = run(&text, &context_with(resolver));

        assert_eq!(result.commits.len(), 9);
        assert!(html.ends_with("abc1234...def5678"));
    }

    #[test]
    fn test_idempotent() {
        let (once, _) = run("<p>abc1234 and abc1234...def5678</p>", &context());
        let (twice, _) = run(&once, &context());

        assert_eq!(twice, once);
    }
}
