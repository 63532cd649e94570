//! Plain text input.

use quill_dom::{Element, Fragment};

use crate::context::Context;
use crate::error::PipelineError;
use crate::filter::Filter;
use crate::result::{Markup, PipelineResult};

/// Accepts plain text and wraps it in a `<div>` so later filters see it as
/// markup. Markup-significant characters are escaped, never interpreted.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextInputFilter;

impl Filter for PlainTextInputFilter {
    fn name(&self) -> &'static str {
        "PlainTextInputFilter"
    }

    fn apply(
        &self,
        input: Markup,
        _context: &Context,
        _result: &mut PipelineResult,
    ) -> Result<Markup, PipelineError> {
        match input {
            Markup::Text(text) => {
                let div = Element::new("div").with_text(text);
                Ok(Markup::Tree(Fragment::new(vec![div.into()])))
            }
            tree @ Markup::Tree(_) => Ok(tree),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_text_escaped_and_wrapped() {
        let mut result = PipelineResult::new();
        let output = PlainTextInputFilter
            .call("a <b> & @c".into(), &Context::new(), &mut result)
            .unwrap();

        assert_eq!(output.into_html(), "<div>a &lt;b&gt; &amp; @c</div>");
    }
}
