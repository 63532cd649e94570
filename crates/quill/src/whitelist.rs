//! Sanitizer policies.
//!
//! A [`Whitelist`] is a positive security model: only listed elements,
//! attributes and URI protocols survive sanitization. The named profiles
//! [`Whitelist::main`], [`Whitelist::limited`] and [`Whitelist::strip_all`]
//! are plain instances of the same structure.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use quill_config::{Profile, SanitizeConfig, WhitelistConfig};

/// Shared default policy.
pub(crate) static MAIN: LazyLock<Whitelist> = LazyLock::new(Whitelist::main);

const MAIN_ELEMENTS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "h7", "h8", "br", "b", "i", "strong", "em", "a", "pre",
    "code", "img", "tt", "div", "ins", "del", "sup", "sub", "p", "ol", "ul", "table", "thead",
    "tbody", "tfoot", "blockquote", "dl", "dt", "dd", "kbd", "q", "samp", "var", "hr", "ruby",
    "rt", "rp", "li", "tr", "td", "th", "s", "strike", "summary", "details",
];

const LIMITED_ELEMENTS: &[&str] = &[
    "b", "i", "strong", "em", "a", "pre", "code", "img", "ins", "del", "sup", "sub", "p", "ol",
    "ul", "li",
];

const GLOBAL_ATTRIBUTES: &[&str] = &[
    "abbr", "accept", "accept-charset", "accesskey", "action", "align", "alt", "axis", "border",
    "cellpadding", "cellspacing", "char", "charoff", "charset", "checked", "clear", "cols",
    "colspan", "color", "compact", "coords", "datetime", "dir", "disabled", "enctype", "for",
    "frame", "headers", "height", "hreflang", "hspace", "ismap", "label", "lang", "maxlength",
    "media", "method", "multiple", "name", "nohref", "noshade", "nowrap", "open", "prompt",
    "readonly", "rel", "rev", "rows", "rowspan", "rules", "scope", "selected", "shape", "size",
    "span", "start", "summary", "tabindex", "target", "title", "type", "usemap", "valign",
    "value", "vspace", "width", "itemprop",
];

const CITE_ELEMENTS: &[&str] = &["blockquote", "del", "ins", "q"];

const LINK_PROTOCOLS: &[&str] = &[
    "http",
    "https",
    "mailto",
    "relative",
    "github-windows",
    "github-mac",
];

const MEDIA_PROTOCOLS: &[&str] = &["http", "https", "relative"];

const DROPPED_CONTENTS: &[&str] = &["script", "style"];

/// Allowed URI protocol for an attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Explicit scheme such as `https`, stored lower-cased.
    Scheme(String),
    /// Schemeless (relative) reference.
    Relative,
}

impl Protocol {
    /// Parse a protocol name; `relative` selects [`Protocol::Relative`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("relative") {
            Self::Relative
        } else {
            Self::Scheme(name.to_ascii_lowercase())
        }
    }
}

/// Unwrap `elements` unless a retained ancestor is one of `required_ancestors`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuralRule {
    /// Elements the rule applies to.
    pub elements: Vec<String>,
    /// Ancestors that satisfy the rule.
    pub required_ancestors: Vec<String>,
}

impl StructuralRule {
    /// Create a rule from element and ancestor names.
    #[must_use]
    pub fn new(elements: &[&str], required_ancestors: &[&str]) -> Self {
        Self {
            elements: to_strings(elements),
            required_ancestors: to_strings(required_ancestors),
        }
    }

    /// Standard list and table rules.
    #[must_use]
    pub fn standard() -> Vec<Self> {
        vec![
            Self::new(&["li"], &["ul", "ol"]),
            Self::new(&["thead", "tbody", "tfoot", "tr", "td", "th"], &["table"]),
        ]
    }
}

/// Sanitizer policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Whitelist {
    elements: HashSet<String>,
    remove_contents: HashSet<String>,
    attributes: HashMap<String, HashSet<String>>,
    global_attributes: HashSet<String>,
    protocols: HashMap<String, HashMap<String, HashSet<Protocol>>>,
    rules: Vec<StructuralRule>,
}

impl Whitelist {
    /// Create an empty policy that allows text only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default profile for comments and issue bodies.
    #[must_use]
    pub fn main() -> Self {
        let mut whitelist = Self::new()
            .with_elements(MAIN_ELEMENTS)
            .with_remove_contents(DROPPED_CONTENTS)
            .with_global_attributes(GLOBAL_ATTRIBUTES)
            .with_attributes("a", &["href"])
            .with_attributes("img", &["src", "longdesc"])
            .with_attributes("div", &["itemscope", "itemtype"])
            .with_protocols("a", "href", LINK_PROTOCOLS)
            .with_protocols("img", "src", MEDIA_PROTOCOLS)
            .with_protocols("img", "longdesc", MEDIA_PROTOCOLS);
        for element in CITE_ELEMENTS {
            whitelist = whitelist
                .with_attributes(element, &["cite"])
                .with_protocols(element, "cite", MEDIA_PROTOCOLS);
        }
        for rule in StructuralRule::standard() {
            whitelist = whitelist.with_rule(rule);
        }
        whitelist
    }

    /// [`Whitelist::main`] restricted to inline formatting, links, images and lists.
    #[must_use]
    pub fn limited() -> Self {
        let mut whitelist = Self::main();
        whitelist.elements = to_strings(LIMITED_ELEMENTS).into_iter().collect();
        whitelist
    }

    /// Text only; script and style contents are dropped.
    #[must_use]
    pub fn strip_all() -> Self {
        Self::new().with_remove_contents(DROPPED_CONTENTS)
    }

    /// Look up a named profile (`main`, `limited` or `strip-all`).
    #[must_use]
    pub fn profile(name: &str) -> Option<Self> {
        match name {
            "main" => Some(Self::main()),
            "limited" => Some(Self::limited()),
            "strip-all" => Some(Self::strip_all()),
            _ => None,
        }
    }

    /// Build the policy selected by a `[sanitize]` configuration section.
    ///
    /// Returns `None` for the custom profile without a custom section, which
    /// configuration validation already rejects.
    #[must_use]
    pub fn from_config(config: &SanitizeConfig) -> Option<Self> {
        match config.profile {
            Profile::Main => Some(Self::main()),
            Profile::Limited => Some(Self::limited()),
            Profile::StripAll => Some(Self::strip_all()),
            Profile::Custom => config.custom.as_ref().map(Self::from_custom),
        }
    }

    /// Build a policy from a custom whitelist description.
    #[must_use]
    pub fn from_custom(custom: &WhitelistConfig) -> Self {
        let mut whitelist = Self::new()
            .with_elements(&as_strs(&custom.elements))
            .with_remove_contents(&as_strs(&custom.remove_contents))
            .with_global_attributes(&as_strs(&custom.global_attributes));
        for (element, attrs) in &custom.attributes {
            whitelist = whitelist.with_attributes(element, &as_strs(attrs));
        }
        for (element, by_attr) in &custom.protocols {
            for (attr, protocols) in by_attr {
                whitelist = whitelist.with_protocols(element, attr, &as_strs(protocols));
            }
        }
        let rules = match &custom.rules {
            Some(rules) => rules
                .iter()
                .map(|r| StructuralRule {
                    elements: lowercase(&r.elements),
                    required_ancestors: lowercase(&r.ancestors),
                })
                .collect(),
            None => StructuralRule::standard(),
        };
        for rule in rules {
            whitelist = whitelist.with_rule(rule);
        }
        whitelist
    }

    /// Allow elements.
    #[must_use]
    pub fn with_elements(mut self, elements: &[&str]) -> Self {
        self.elements.extend(lowercase_strs(elements));
        self
    }

    /// Drop elements together with their contents.
    #[must_use]
    pub fn with_remove_contents(mut self, elements: &[&str]) -> Self {
        self.remove_contents.extend(lowercase_strs(elements));
        self
    }

    /// Allow attributes on every element.
    #[must_use]
    pub fn with_global_attributes(mut self, attrs: &[&str]) -> Self {
        self.global_attributes.extend(lowercase_strs(attrs));
        self
    }

    /// Allow attributes on one element.
    #[must_use]
    pub fn with_attributes(mut self, element: &str, attrs: &[&str]) -> Self {
        self.attributes
            .entry(element.to_ascii_lowercase())
            .or_default()
            .extend(lowercase_strs(attrs));
        self
    }

    /// Restrict the URI protocols accepted for `element`'s `attr`.
    #[must_use]
    pub fn with_protocols(mut self, element: &str, attr: &str, protocols: &[&str]) -> Self {
        self.protocols
            .entry(element.to_ascii_lowercase())
            .or_default()
            .entry(attr.to_ascii_lowercase())
            .or_default()
            .extend(protocols.iter().map(|p| Protocol::parse(p)));
        self
    }

    /// Add a structural rule.
    #[must_use]
    pub fn with_rule(mut self, rule: StructuralRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Whether `element` is retained.
    #[must_use]
    pub fn allows_element(&self, element: &str) -> bool {
        self.elements.contains(element)
    }

    /// Whether `element` is dropped with its contents.
    #[must_use]
    pub fn removes_contents(&self, element: &str) -> bool {
        self.remove_contents.contains(element)
    }

    /// Whether `attr` may appear on `element`.
    #[must_use]
    pub fn allows_attribute(&self, element: &str, attr: &str) -> bool {
        self.global_attributes.contains(attr)
            || self
                .attributes
                .get(element)
                .is_some_and(|attrs| attrs.contains(attr))
    }

    /// Protocols accepted for `element`'s `attr`, if the attribute is URI-bearing.
    #[must_use]
    pub fn protocols(&self, element: &str, attr: &str) -> Option<&HashSet<Protocol>> {
        self.protocols.get(element)?.get(attr)
    }

    /// Structural rules.
    #[must_use]
    pub fn rules(&self) -> &[StructuralRule] {
        &self.rules
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|&v| v.to_owned()).collect()
}

fn lowercase_strs<'a>(values: &'a [&str]) -> impl Iterator<Item = String> + 'a {
    values.iter().map(|v| v.to_ascii_lowercase())
}

fn lowercase(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_ascii_lowercase()).collect()
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use quill_config::RuleConfig;

    use super::*;

    #[test]
    fn test_main_profile() {
        let whitelist = Whitelist::main();

        assert!(whitelist.allows_element("h8"));
        assert!(whitelist.allows_element("details"));
        assert!(!whitelist.allows_element("script"));
        assert!(whitelist.removes_contents("style"));
        assert!(whitelist.allows_attribute("a", "href"));
        assert!(whitelist.allows_attribute("p", "lang"));
        assert!(!whitelist.allows_attribute("p", "href"));
        assert!(!whitelist.allows_attribute("a", "onclick"));
        assert!(whitelist.allows_attribute("q", "cite"));
        assert_eq!(whitelist.rules().len(), 2);
    }

    #[test]
    fn test_main_link_protocols() {
        let whitelist = Whitelist::main();
        let protocols = whitelist.protocols("a", "href").unwrap();

        assert!(protocols.contains(&Protocol::Relative));
        assert!(protocols.contains(&Protocol::Scheme("github-mac".to_owned())));
        assert!(!protocols.contains(&Protocol::Scheme("javascript".to_owned())));
        assert!(whitelist.protocols("a", "title").is_none());
    }

    #[test]
    fn test_limited_profile() {
        let whitelist = Whitelist::limited();

        assert!(whitelist.allows_element("li"));
        assert!(!whitelist.allows_element("table"));
        assert!(!whitelist.allows_element("h1"));
        assert!(whitelist.allows_attribute("img", "src"));
    }

    #[test]
    fn test_strip_all_profile() {
        let whitelist = Whitelist::strip_all();

        assert!(!whitelist.allows_element("p"));
        assert!(whitelist.removes_contents("script"));
    }

    #[test]
    fn test_profile_lookup() {
        assert_eq!(Whitelist::profile("limited"), Some(Whitelist::limited()));
        assert!(Whitelist::profile("relaxed").is_none());
    }

    #[test]
    fn test_from_custom_config() {
        let custom = WhitelistConfig {
            elements: vec!["P".to_owned(), "a".to_owned()],
            remove_contents: vec!["script".to_owned()],
            global_attributes: vec!["title".to_owned()],
            attributes: HashMap::from([("a".to_owned(), vec!["href".to_owned()])]),
            protocols: HashMap::from([(
                "a".to_owned(),
                HashMap::from([("href".to_owned(), vec!["HTTPS".to_owned()])]),
            )]),
            rules: Some(vec![RuleConfig {
                elements: vec!["a".to_owned()],
                ancestors: vec!["p".to_owned()],
            }]),
        };

        let whitelist = Whitelist::from_custom(&custom);

        assert!(whitelist.allows_element("p"));
        assert!(whitelist.allows_attribute("a", "href"));
        assert!(whitelist.allows_attribute("p", "title"));
        let protocols = whitelist.protocols("a", "href").unwrap();
        assert!(protocols.contains(&Protocol::Scheme("https".to_owned())));
        assert_eq!(whitelist.rules(), [StructuralRule::new(&["a"], &["p"])]);
    }

    #[test]
    fn test_from_config_profiles() {
        let config = SanitizeConfig {
            profile: Profile::StripAll,
            custom: None,
        };
        assert_eq!(Whitelist::from_config(&config), Some(Whitelist::strip_all()));

        let config = SanitizeConfig {
            profile: Profile::Custom,
            custom: None,
        };
        assert!(Whitelist::from_config(&config).is_none());
    }
}
