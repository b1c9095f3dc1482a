//! Decides which phrases machine translation must not touch.
//!
//! The web backend renders a source file as HTML in which every translatable
//! string is an element with class `crowdin_phrase` and id
//! `crowdin_phrase_<translation id>`. Strings inside code samples, front
//! matter or link targets should stay hidden; for reStructuredText files the
//! same applies to directive and role markup.

use scraper::{ElementRef, Html, Selector};

const PHRASE_ID_PREFIX: &str = "crowdin_phrase_";

/// Desired visibility of one phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseVisibility {
    pub translation_id: String,
    pub hide: bool,
}

/// Classify every phrase in a `phrases_as_html` rendition.
pub fn classify_phrases(html: &str, rst: bool) -> Vec<PhraseVisibility> {
    let Ok(selector) = Selector::parse(".crowdin_phrase") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|phrase| {
            let id = phrase.value().id()?.strip_prefix(PHRASE_ID_PREFIX)?;
            let hide = if rst {
                is_rst_directive(&element_text(phrase))
            } else {
                is_code_like(phrase)
            };
            Some(PhraseVisibility {
                translation_id: id.to_string(),
                hide,
            })
        })
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn parent_elements(element: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    element.ancestors().filter_map(ElementRef::wrap)
}

fn nearest_named<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    parent_elements(element).find(|e| e.value().name() == name)
}

/// A `code`/`pre` element counts unless it is a syntax-highlight wrapper
/// whose class looks like an RST role (`foo::`) or a template (`{...}`).
/// Other elements count when they merely wrap a code block or an image.
fn should_hide_tag(element: ElementRef<'_>) -> bool {
    let name = element.value().name();
    if name != "code" && name != "pre" {
        let inner = element.inner_html();
        return (inner.starts_with("<code") && inner.ends_with("</code>"))
            || (inner.starts_with("<pre") && inner.ends_with("</pre>"))
            || (inner.starts_with("<img") && inner.ends_with('>') && inner.matches('<').count() == 1);
    }

    let mut classes = element.value().classes().peekable();
    if classes.peek().is_none() {
        return true;
    }
    !classes.any(|class| class.ends_with("::") || class.starts_with('{'))
}

fn is_hidden_link(element: ElementRef<'_>) -> bool {
    let Some(block) = parent_elements(element)
        .find(|e| e.value().classes().any(|c| c == "hidden_texts_block"))
    else {
        return false;
    };
    let Ok(title) = Selector::parse(".hidden_phrases_title") else {
        return false;
    };
    block
        .select(&title)
        .next()
        .is_some_and(|t| element_text(t).trim() == "Link addresses")
}

/// Whether a Markdown/HTML phrase is code, front matter or a link target.
pub fn is_code_like(phrase: ElementRef<'_>) -> bool {
    let text = element_text(phrase);
    if text.starts_with("[TOC") || (text.contains("CVSS") && text.contains("CVE")) {
        return true;
    }
    if parent_elements(phrase).any(|e| e.value().id() == Some("front-matter")) {
        return true;
    }
    if should_hide_tag(phrase) || is_hidden_link(phrase) {
        return true;
    }

    let code = nearest_named(phrase, "code");
    let pre = nearest_named(phrase, "pre");
    if code.is_none() && pre.is_none() {
        return false;
    }
    code.is_none_or(should_hide_tag) && pre.is_none_or(should_hide_tag)
}

/// Whether an RST phrase is directive, role or heading markup.
pub fn is_rst_directive(text: &str) -> bool {
    !text.is_empty()
        && (text.contains("====")
            || text.contains("----")
            || text == ".."
            || text.contains("::")
            || text.starts_with(':')
            || text.contains(":doc:")
            || text.contains(":ref:")
            || text.to_lowercase() == text
            || text.ends_with(".md")
            || text.ends_with(".rst"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden(html: &str) -> Vec<(String, bool)> {
        classify_phrases(html, false)
            .into_iter()
            .map(|p| (p.translation_id, p.hide))
            .collect()
    }

    #[test]
    fn plain_prose_stays_visible() {
        let html = r#"<p><span class="crowdin_phrase" id="crowdin_phrase_1">Install the app.</span></p>"#;
        assert_eq!(hidden(html), vec![("1".to_string(), false)]);
    }

    #[test]
    fn code_blocks_are_hidden() {
        let html = r#"
            <pre><code><span class="crowdin_phrase" id="crowdin_phrase_2">npm install</span></code></pre>
            <p><span class="crowdin_phrase" id="crowdin_phrase_3"><code>./gradlew</code></span></p>
        "#;
        assert_eq!(
            hidden(html),
            vec![("2".to_string(), true), ("3".to_string(), true)]
        );
    }

    #[test]
    fn rst_role_highlighting_is_not_code() {
        let html = r#"<code class="rst::"><span class="crowdin_phrase" id="crowdin_phrase_4">See the guide</span></code>"#;
        assert_eq!(hidden(html), vec![("4".to_string(), false)]);
    }

    #[test]
    fn front_matter_toc_and_advisories_are_hidden() {
        let html = r#"
            <div id="front-matter"><span class="crowdin_phrase" id="crowdin_phrase_5">uuid: 1234</span></div>
            <p><span class="crowdin_phrase" id="crowdin_phrase_6">[TOC levels=1-3]</span></p>
            <p><span class="crowdin_phrase" id="crowdin_phrase_7">CVSS 9.8 for CVE-2024-0001</span></p>
        "#;
        assert!(hidden(html).iter().all(|(_, hide)| *hide));
    }

    #[test]
    fn link_addresses_block_is_hidden() {
        let html = r#"
            <div class="hidden_texts_block">
              <div class="hidden_phrases_title"> Link addresses </div>
              <span class="crowdin_phrase" id="crowdin_phrase_8">https://example.com/docs</span>
            </div>
        "#;
        assert_eq!(hidden(html), vec![("8".to_string(), true)]);
    }

    #[test]
    fn rst_directives() {
        assert!(is_rst_directive(".. note::"));
        assert!(is_rst_directive("========"));
        assert!(is_rst_directive(":doc:`install`"));
        assert!(is_rst_directive("installation.rst"));
        assert!(is_rst_directive("lowercase words only"));
        assert!(!is_rst_directive("Install the App"));
        assert!(!is_rst_directive(""));
    }

    #[test]
    fn rst_mode_classifies_by_text() {
        let html = r#"
            <span class="crowdin_phrase" id="crowdin_phrase_9">.. toctree::</span>
            <span class="crowdin_phrase" id="crowdin_phrase_10">Getting Started</span>
        "#;
        let result: Vec<bool> = classify_phrases(html, true).into_iter().map(|p| p.hide).collect();
        assert_eq!(result, vec![true, false]);
    }
}
