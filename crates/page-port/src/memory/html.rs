//! Fixture HTML: parsing into plain fragments and serializing back.

use scraper::{ElementRef, Html};

/// Parsed fixture content, ready to be grafted onto a [`super::DomTree`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Fragment {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<Fragment>,
    },
    Text(String),
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Parse `html` the way a browser parses `innerHTML` in a `<body>`.
/// Comments are dropped; whitespace-only text collapses to one space.
pub(crate) fn parse_fragment(html: &str) -> Vec<Fragment> {
    let document = Html::parse_fragment(html);
    children_of(document.root_element())
}

fn children_of(element: ElementRef<'_>) -> Vec<Fragment> {
    element
        .children()
        .filter_map(|child| {
            if let Some(element) = ElementRef::wrap(child) {
                return Some(Fragment::Element {
                    tag: element.value().name().to_string(),
                    attrs: element
                        .value()
                        .attrs()
                        .map(|(key, value)| (key.to_string(), value.to_string()))
                        .collect(),
                    children: children_of(element),
                });
            }
            let text: &str = &child.value().as_text()?.text;
            if text.trim().is_empty() {
                Some(Fragment::Text(" ".to_string()))
            } else {
                Some(Fragment::Text(text.to_string()))
            }
        })
        .collect()
}

pub(crate) fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attr(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}
