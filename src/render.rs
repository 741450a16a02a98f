//! Markdown to display markup.
//!
//! Math spans are swapped for placeholders before pulldown-cmark sees the
//! text so that `_`, `*` and `\` inside TeX survive untouched, then put back
//! after conversion. Code highlighting and math typesetting are delegated to
//! highlight.js and KaTeX through the bindings at the bottom of this file.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::OnceLock;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

const MATH_PLACEHOLDER: &str = "MATH_EXPRESSION_";
const MATH_PLACEHOLDER_END: &str = "_END";

pub trait CodeHighlighter {
    /// Return highlighted HTML for `code`. `lang` is the fence info word, if any.
    fn highlight(&self, code: &str, lang: Option<&str>) -> String;
}

/// Escapes code without any coloring.
pub struct PlainHighlighter;

impl CodeHighlighter for PlainHighlighter {
    fn highlight(&self, code: &str, _lang: Option<&str>) -> String {
        escape_html(code)
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Replace `$$…$$` and `$…$` spans with numbered placeholders.
pub fn protect_math(source: &str) -> (String, Vec<String>) {
    static RE_MATH: OnceLock<Regex> = OnceLock::new();
    let re_math = RE_MATH.get_or_init(|| Regex::new(r"(?s)\$\$.+?\$\$|\$.+?\$").unwrap());

    let mut expressions = Vec::new();
    let protected = re_math.replace_all(source, |caps: &Captures| {
        let id = expressions.len();
        expressions.push(caps[0].to_string());
        format!("{MATH_PLACEHOLDER}{id}{MATH_PLACEHOLDER_END}")
    });
    (protected.into_owned(), expressions)
}

/// Put math spans back, escaped so the text node holds the exact TeX source.
pub fn restore_math(html: &str, expressions: &[String]) -> String {
    static RE_PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re_placeholder =
        RE_PLACEHOLDER.get_or_init(|| Regex::new(r"MATH_EXPRESSION_(\d+)_END").unwrap());

    re_placeholder
        .replace_all(html, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|id| expressions.get(id))
                .map(|expr| escape_html(expr))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_GFM
}

/// GitHub-flavored conversion where every newline inside a paragraph is a
/// line break and code blocks go through `highlighter`.
pub fn markdown_to_html(source: &str, highlighter: &impl CodeHighlighter) -> String {
    let mut code_lang: Option<String> = None;
    let mut code_buf: Option<String> = None;

    let events = Parser::new_ext(source, markdown_options()).filter_map(|event| match event {
        Event::Start(Tag::CodeBlock(kind)) => {
            code_lang = match kind {
                CodeBlockKind::Fenced(info) => info
                    .split_whitespace()
                    .next()
                    .filter(|lang| !lang.is_empty())
                    .map(str::to_string),
                CodeBlockKind::Indented => None,
            };
            code_buf = Some(String::new());
            None
        }
        Event::Text(text) if code_buf.is_some() => {
            if let Some(buf) = code_buf.as_mut() {
                buf.push_str(&text);
            }
            None
        }
        Event::End(TagEnd::CodeBlock) => {
            let code = code_buf.take().unwrap_or_default();
            let lang = code_lang.take();
            let highlighted = highlighter.highlight(&code, lang.as_deref());
            let class = match &lang {
                Some(lang) => format!("hljs language-{}", escape_html(lang)),
                None => "hljs".to_string(),
            };
            Some(Event::Html(CowStr::from(format!(
                "<pre><code class=\"{class}\">{highlighted}</code></pre>\n"
            ))))
        }
        Event::SoftBreak => Some(Event::HardBreak),
        other => Some(other),
    });

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// The full text-to-markup pipeline, minus the DOM passes.
pub fn render_document(source: &str, highlighter: &impl CodeHighlighter) -> String {
    let (protected, expressions) = protect_math(source);
    let html = markdown_to_html(&protected, highlighter);
    restore_math(&html, &expressions)
}

/// Links that leave the single-page router open in a new browsing context.
pub fn is_outbound(href: &str) -> bool {
    !href.starts_with('#')
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = hljs, js_name = getLanguage)]
    fn hljs_get_language(name: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = hljs, js_name = highlight)]
    fn hljs_highlight(code: &str, options: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = hljs, js_name = highlightAuto)]
    fn hljs_highlight_auto(code: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_name = renderMathInElement)]
    fn render_math_in_element(element: &web_sys::Element, options: &JsValue) -> Result<(), JsValue>;
}

#[derive(Serialize)]
struct HighlightArgs<'a> {
    language: &'a str,
}

#[derive(Serialize)]
struct MathDelimiter {
    left: &'static str,
    right: &'static str,
    display: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MathOptions {
    delimiters: [MathDelimiter; 4],
    throw_on_error: bool,
    output: &'static str,
    trust: bool,
    strict: bool,
}

/// highlight.js loaded as the `hljs` global.
pub struct Hljs;

impl Hljs {
    fn knows(lang: &str) -> bool {
        hljs_get_language(lang)
            .map(|found| !found.is_undefined() && !found.is_null())
            .unwrap_or(false)
    }
}

impl CodeHighlighter for Hljs {
    fn highlight(&self, code: &str, lang: Option<&str>) -> String {
        let result = match lang.filter(|lang| Self::knows(lang)) {
            Some(language) => serde_wasm_bindgen::to_value(&HighlightArgs { language })
                .map_err(JsValue::from)
                .and_then(|args| hljs_highlight(code, &args)),
            None => hljs_highlight_auto(code),
        };
        result
            .ok()
            .and_then(|value| js_sys::Reflect::get(&value, &JsValue::from_str("value")).ok())
            .and_then(|value| value.as_string())
            .unwrap_or_else(|| {
                log::debug!("highlight.js unavailable, emitting plain code");
                PlainHighlighter.highlight(code, lang)
            })
    }
}

/// KaTeX auto-render over freshly injected markup. Errors render inline.
pub fn typeset_math(container: &web_sys::Element) {
    let options = MathOptions {
        delimiters: [
            MathDelimiter { left: "$$", right: "$$", display: true },
            MathDelimiter { left: "$", right: "$", display: false },
            MathDelimiter { left: "\\(", right: "\\)", display: false },
            MathDelimiter { left: "\\[", right: "\\]", display: true },
        ],
        throw_on_error: false,
        output: "html",
        trust: true,
        strict: false,
    };
    let result = serde_wasm_bindgen::to_value(&options)
        .map_err(JsValue::from)
        .and_then(|options| render_math_in_element(container, &options));
    if let Err(err) = result {
        log::warn!("math typesetting skipped: {err:?}");
    }
}

pub fn mark_outbound_links(container: &web_sys::Element) {
    let Ok(links) = container.query_selector_all("a") else {
        return;
    };
    for idx in 0..links.length() {
        let Some(link) = links.get(idx).and_then(|node| node.dyn_into::<web_sys::Element>().ok())
        else {
            continue;
        };
        let Some(href) = link.get_attribute("href") else {
            continue;
        };
        if is_outbound(&href) {
            let _ = link.set_attribute("target", "_blank");
            let _ = link.set_attribute("rel", "noopener noreferrer");
        }
    }
}
