//! HTML character reference decoding.
//!
//! The reader reports `&name;` references as separate events; this module maps
//! them (and references embedded in attribute values) back to characters.

use std::sync::LazyLock;

use regex::Regex;

/// Regex pattern for named and numeric character references.
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z][a-zA-Z0-9]*);")
        .expect("invalid reference regex")
});

/// Decode every known character reference in `text`.
///
/// Unknown named references are preserved as-is.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    REFERENCE_PATTERN
        .replace_all(text, |caps: &regex::Captures| {
            decode_reference(&caps[1]).unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}

/// Decode a single reference body (the part between `&` and `;`).
pub(crate) fn decode_reference(name: &str) -> Option<String> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = if let Some(hex) = numeric
            .strip_prefix('x')
            .or_else(|| numeric.strip_prefix('X'))
        {
            u32::from_str_radix(hex, 16).ok()
        } else {
            numeric.parse::<u32>().ok()
        };
        // NUL and surrogates decode to the replacement character
        return code.map(|c| match c {
            0 => '\u{fffd}'.to_string(),
            _ => char::from_u32(c).unwrap_or('\u{fffd}').to_string(),
        });
    }
    entity_to_unicode(name).map(str::to_owned)
}

/// Map HTML entity name to Unicode character.
fn entity_to_unicode(name: &str) -> Option<&'static str> {
    Some(match name {
        // XML predefined
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",

        // Common entities
        "nbsp" => "\u{00a0}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "bull" => "\u{2022}",
        "hellip" => "\u{2026}",
        "commat" => "@",
        "num" => "#",
        "sol" => "/",

        // Arrows
        "rarr" => "\u{2192}",
        "larr" => "\u{2190}",
        "harr" => "\u{2194}",
        "uarr" => "\u{2191}",
        "darr" => "\u{2193}",

        // Math symbols
        "le" => "\u{2264}",
        "ge" => "\u{2265}",
        "ne" => "\u{2260}",
        "plusmn" => "\u{00b1}",
        "times" => "\u{00d7}",
        "divide" => "\u{00f7}",

        // Legal symbols
        "copy" => "\u{00a9}",
        "reg" => "\u{00ae}",
        "trade" => "\u{2122}",

        // Currency
        "euro" => "\u{20ac}",
        "pound" => "\u{00a3}",
        "yen" => "\u{00a5}",
        "cent" => "\u{00a2}",

        // Misc symbols
        "deg" => "\u{00b0}",
        "para" => "\u{00b6}",
        "sect" => "\u{00a7}",
        "dagger" => "\u{2020}",
        "Dagger" => "\u{2021}",
        "laquo" => "\u{00ab}",
        "raquo" => "\u{00bb}",
        "iexcl" => "\u{00a1}",
        "iquest" => "\u{00bf}",

        // Fractions
        "frac14" => "\u{00bc}",
        "frac12" => "\u{00bd}",
        "frac34" => "\u{00be}",

        // Superscripts
        "sup1" => "\u{00b9}",
        "sup2" => "\u{00b2}",
        "sup3" => "\u{00b3}",

        // Other
        "acute" => "\u{00b4}",
        "micro" => "\u{00b5}",
        "middot" => "\u{00b7}",
        "cedil" => "\u{00b8}",
        "ordf" => "\u{00aa}",
        "ordm" => "\u{00ba}",
        "zwj" => "\u{200d}",
        "zwnj" => "\u{200c}",

        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_nbsp() {
        assert_eq!(decode_entities("Hello&nbsp;World"), "Hello\u{00a0}World");
    }

    #[test]
    fn test_decode_xml_entities() {
        assert_eq!(decode_entities("&amp;&lt;&gt;&quot;"), "&<>\"");
    }

    #[test]
    fn test_decode_numeric_references() {
        assert_eq!(decode_entities("&#64;user &#x23;12"), "@user #12");
    }

    #[test]
    fn test_decode_invalid_code_point() {
        assert_eq!(decode_entities("&#xD800;"), "\u{fffd}");
        assert_eq!(decode_entities("&#0;"), "\u{fffd}");
    }

    #[test]
    fn test_preserve_unknown_entities() {
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_no_entities() {
        assert_eq!(decode_entities("Hello World"), "Hello World");
    }
}
