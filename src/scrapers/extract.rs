//! Title and body text extraction from a post page.
//!
//! A vc.ru post page carries its headline in `h1.content-title` (older
//! layouts use `div.content-title`) and its body as `<p>` blocks inside
//! `article.content__blocks`.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

/// Title selectors, most specific first.
static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["h1.content-title", "div.content-title"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article.content__blocks p").unwrap());

/// Title and body text pulled out of one document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extracted {
    pub title: Option<String>,
    pub text: String,
}

/// Extract the title and the paragraph text from `html`.
///
/// Never fails: a document without a title yields `title: None`, one without
/// paragraphs yields an empty `text`. Paragraphs that are empty after
/// trimming are dropped; the rest are joined with a blank line.
pub fn extract(html: &str) -> Extracted {
    let document = Html::parse_document(html);

    let title = TITLE_SELECTORS
        .iter()
        .find_map(|selector| document.select(selector).next())
        .map(stripped_text)
        .filter(|t| !t.is_empty());

    let text = document
        .select(&PARAGRAPH_SELECTOR)
        .map(stripped_text)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    Extracted { title, text }
}

/// All text under `element`, with leading and trailing whitespace removed.
pub(crate) fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
