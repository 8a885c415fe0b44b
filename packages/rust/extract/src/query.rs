//! Small tree-query helpers over `scraper` documents.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

/// `true` if any class token of `el` contains `target`, so `content` also
/// matches `contentafterlink` and `contentwithoutlink`.
pub fn class_matches(el: &ElementRef<'_>, target: &str) -> bool {
    el.value().classes().any(|class| class.contains(target))
}

/// `true` if `el` carries exactly the class token `class`.
pub fn has_class(el: &ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Element children of `el` with tag name `tag`, in document order.
pub fn children_named<'a>(el: ElementRef<'a>, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name() == tag)
}

/// Elements reached by following `path` one child level per tag name,
/// like the XPath `./a/b/c`.
pub fn descend<'a>(root: ElementRef<'a>, path: &[&'a str]) -> Vec<ElementRef<'a>> {
    let mut current = vec![root];
    for tag in path {
        current = current
            .into_iter()
            .flat_map(|el| children_named(el, *tag))
            .collect();
    }
    current
}

/// Text nodes of `el` that come before its first child element.
pub fn leading_text(el: &ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in el.children() {
        if node.value().is_element() {
            break;
        }
        if let Some(t) = node.value().as_text() {
            text.push_str(t);
        }
    }
    text
}

/// Decode HTML entities (`&amp;`, `&#039;`, ...) in a plain-text value.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let escaped = raw.replace('<', "&lt;").replace('>', "&gt;");
    Html::parse_fragment(&escaped).root_element().text().collect()
}

/// `value` of the first `<input name="...">` in the document.
pub fn input_value(doc: &Html, name: &str) -> Option<String> {
    static INPUT_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("input[name]").expect("valid selector"));

    doc.select(&INPUT_SEL)
        .filter(|el| el.value().attr("name") == Some(name))
        .find_map(|el| el.value().attr("value").map(String::from))
}
