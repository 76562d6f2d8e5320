//! HTML content extraction.
//!
//! Two modes: selector-driven (per-source CSS selectors with ordered
//! comma-separated fallbacks) and a generic mode for pages with no
//! configured recipe. Link harvesting unwraps the two redirect shapes
//! search engines put in front of result links.

use std::collections::{HashMap, HashSet};

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Minimum length for a text segment to count as content.
const MIN_SEGMENT_CHARS: usize = 20;

/// Minimum length for extracted content to be considered usable.
const MIN_CONTENT_CHARS: usize = 100;

/// Block-like descendants walked when assembling the `content` field.
const BLOCK_SELECTOR: &str = "p, div, li, h1, h2, h3, h4, h5, h6";

/// Unicode punctuation kept by the text cleaner.
const UNICODE_WHITELIST: [char; 11] = ['\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '—', '–', '€', '£', '¥', '©', '®'];

fn element_text(el: &ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Select elements using the first matching selector from a
/// comma-separated fallback list.
fn select_with_fallbacks<'a>(document: &'a Html, selector_list: &str) -> Vec<ElementRef<'a>> {
    for candidate in selector_list.split(',') {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        let Ok(selector) = Selector::parse(candidate) else {
            warn!(selector = %candidate, "invalid CSS selector, skipping");
            continue;
        };
        let matched: Vec<_> = document.select(&selector).collect();
        if !matched.is_empty() {
            return matched;
        }
    }
    Vec::new()
}

/// Assemble article body text from matched container elements.
///
/// Walks block-like descendants, keeps segments of at least 20 chars,
/// dedupes by whitespace-normalised form, and joins with blank lines so
/// paragraph boundaries survive.
fn collect_content(elements: &[ElementRef]) -> Option<String> {
    let block = Selector::parse(BLOCK_SELECTOR).expect("static selector");
    let mut seen: HashSet<String> = HashSet::new();
    let mut segments: Vec<String> = Vec::new();

    for el in elements {
        let blocks: Vec<_> = el.select(&block).collect();
        if blocks.is_empty() {
            let text = element_text(el);
            if text.len() >= MIN_SEGMENT_CHARS && seen.insert(text.clone()) {
                segments.push(text);
            }
            continue;
        }
        for child in blocks {
            let text = element_text(&child);
            if text.len() >= MIN_SEGMENT_CHARS && seen.insert(text.clone()) {
                segments.push(text);
            }
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("\n\n"))
    }
}

/// Extract fields using per-source CSS selectors.
///
/// Each selector value may be a comma-separated ordered list of
/// fallbacks; the first selector that matches wins. The `content` field
/// gets paragraph-preserving assembly; other fields join matched element
/// text with single spaces.
pub fn extract_with_selectors(
    html: &str,
    selectors: &HashMap<String, String>,
) -> HashMap<String, Option<String>> {
    let document = Html::parse_document(html);
    let mut extracted = HashMap::new();

    for (field, selector_list) in selectors {
        let elements = select_with_fallbacks(&document, selector_list);
        if elements.is_empty() {
            debug!(field = %field, selectors = %selector_list, "no elements matched");
            extracted.insert(field.clone(), None);
            continue;
        }

        let value = if field == "content" {
            collect_content(&elements)
        } else {
            let joined = elements
                .iter()
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        };

        extracted.insert(field.clone(), value);
    }

    extracted
}

/// Generic extraction for pages without a configured recipe.
pub fn extract_generic(html: &str) -> HashMap<String, Option<String>> {
    let document = Html::parse_document(html);
    let mut extracted = HashMap::new();

    let title = select_with_fallbacks(&document, "h1, title, .article-title, .headline")
        .first()
        .map(element_text)
        .filter(|t| !t.is_empty());
    extracted.insert("title".to_string(), title);

    // Main content containers first, paragraphs inside the winner.
    let mut content = None;
    let containers =
        select_with_fallbacks(&document, "article, main, .article-body, .content, [role=\"main\"]");
    if let Some(container) = containers.first() {
        let p = Selector::parse("p").expect("static selector");
        let paragraphs: Vec<String> = container
            .select(&p)
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            content = Some(paragraphs.join("\n\n"));
        }
    }
    if content.is_none() {
        // Union of all paragraph text as the last resort.
        let p = Selector::parse("p").expect("static selector");
        let paragraphs: Vec<String> = document
            .select(&p)
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            content = Some(paragraphs.join("\n\n"));
        }
    }
    extracted.insert("content".to_string(), content);

    let date = select_with_fallbacks(&document, "time, .published-date, .date, [datetime]")
        .first()
        .map(|el| {
            let text = element_text(el);
            if text.is_empty() {
                el.value().attr("datetime").unwrap_or("").to_string()
            } else {
                text
            }
        })
        .filter(|t| !t.is_empty());
    extracted.insert("date".to_string(), date);

    let author = select_with_fallbacks(&document, ".author, [rel=\"author\"], .byline, .author-name")
        .first()
        .map(element_text)
        .filter(|t| !t.is_empty());
    extracted.insert("author".to_string(), author);

    extracted
}

fn unwrap_redirect(href: &str) -> Option<String> {
    // DuckDuckGo result links: //duckduckgo.com/l/?uddg=<encoded target>
    if href.contains("duckduckgo.com/l/") && href.contains("uddg=") {
        let absolute = if href.starts_with("//") {
            format!("https:{}", href)
        } else {
            href.to_string()
        };
        let parsed = Url::parse(&absolute).ok()?;
        let target = parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())?;
        return target.starts_with("http").then_some(target);
    }

    // Google result links: /url?q=<encoded target>
    if let Some(query) = href.strip_prefix("/url?") {
        let target = url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())?;
        return target.starts_with("http").then_some(target);
    }

    None
}

/// Harvest candidate URLs from anchors matching `selector`.
///
/// Unwraps Google and DuckDuckGo redirect links; only absolute http(s)
/// URLs are returned. Harvesting never follows anything.
pub fn extract_links(html: &str, selector: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for candidate in selector.split(',') {
        let candidate = candidate.trim();
        let Ok(sel) = Selector::parse(candidate) else {
            warn!(selector = %candidate, "invalid link selector");
            continue;
        };

        for element in document.select(&sel) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };

            if let Some(target) = unwrap_redirect(href) {
                links.push(target);
            } else if href.starts_with("http://") || href.starts_with("https://") {
                links.push(href.to_string());
            }
        }

        if !links.is_empty() {
            break;
        }
    }

    debug!(count = links.len(), "harvested links");
    links
}

/// Clean extracted text: strip control characters, normalise whitespace,
/// drop `[...]` artefacts, keep common punctuation and a small Unicode
/// whitelist.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut kept = String::with_capacity(text.len());
    for c in text.chars() {
        if c == ' ' || c == '\t' || c == '\n' || c == '\r' {
            kept.push(c);
        } else if c.is_ascii() {
            if !c.is_ascii_control() {
                kept.push(c);
            }
        } else if c.is_alphanumeric() || UNICODE_WHITELIST.contains(&c) || c == '™' {
            kept.push(c);
        }
    }

    let collapsed = normalize_whitespace(&kept);
    let without_brackets = regex::Regex::new(r"\[[^\]]*\]")
        .expect("static pattern")
        .replace_all(&collapsed, "");

    normalize_whitespace(&without_brackets)
}

/// Check whether cleaned content is substantial enough to process.
///
/// Requires at least 100 chars. A low printable-punctuation ratio is
/// logged but does not reject: downstream quality gates make the final
/// call before any expensive work.
pub fn is_valid_content(content: &str) -> bool {
    let cleaned = clean_text(content);
    if cleaned.len() < MIN_CONTENT_CHARS {
        return false;
    }

    let sample: Vec<char> = cleaned.chars().take(1000).collect();
    let readable = sample
        .iter()
        .filter(|c| {
            c.is_alphanumeric() || c.is_whitespace() || ".,!?;:()-\"'/&%$#@".contains(**c)
        })
        .count();
    let ratio = readable as f64 / sample.len() as f64;

    if ratio < 0.40 {
        warn!(ratio = ratio, "content readability is low, processing anyway");
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"
        <html><head><title>Page Title</title></head><body>
        <h1 class="headline">Summit Concludes</h1>
        <div class="article-body">
            <p>The two leaders met in the capital to discuss trade relations and sign agreements.</p>
            <p>The two leaders met in the capital to discuss trade relations and sign agreements.</p>
            <p>Short.</p>
            <p>Officials said the talks covered energy cooperation and border security in detail.</p>
        </div>
        <span class="author-name">Jane Reporter</span>
        <time datetime="2024-03-01">March 1, 2024</time>
        </body></html>
    "#;

    #[test]
    fn test_selector_extraction_with_fallbacks() {
        let mut selectors = HashMap::new();
        selectors.insert("title".to_string(), ".missing, h1.headline".to_string());
        selectors.insert("content".to_string(), "div.article-body".to_string());
        selectors.insert("author".to_string(), ".author-name".to_string());

        let extracted = extract_with_selectors(ARTICLE, &selectors);

        assert_eq!(
            extracted["title"].as_deref(),
            Some("Summit Concludes")
        );
        assert_eq!(extracted["author"].as_deref(), Some("Jane Reporter"));

        let content = extracted["content"].as_deref().unwrap();
        // Duplicate paragraph appears once; short segment dropped.
        assert_eq!(content.matches("two leaders met").count(), 1);
        assert!(!content.contains("Short."));
        assert!(content.contains("energy cooperation"));
    }

    #[test]
    fn test_selector_extraction_is_deterministic() {
        let mut selectors = HashMap::new();
        selectors.insert("content".to_string(), "div.article-body".to_string());

        let a = extract_with_selectors(ARTICLE, &selectors);
        let b = extract_with_selectors(ARTICLE, &selectors);
        assert_eq!(a, b);
    }

    #[test]
    fn test_generic_extraction() {
        let extracted = extract_generic(ARTICLE);

        assert_eq!(extracted["title"].as_deref(), Some("Summit Concludes"));
        assert!(extracted["content"]
            .as_deref()
            .unwrap()
            .contains("trade relations"));
        assert_eq!(extracted["author"].as_deref(), Some("Jane Reporter"));
        assert_eq!(extracted["date"].as_deref(), Some("March 1, 2024"));
    }

    #[test]
    fn test_generic_falls_back_to_all_paragraphs() {
        let html = "<html><body><p>Paragraph one with enough text.</p><p>Paragraph two here.</p></body></html>";
        let extracted = extract_generic(html);
        let content = extracted["content"].as_deref().unwrap();
        assert!(content.contains("Paragraph one"));
        assert!(content.contains("Paragraph two"));
    }

    #[test]
    fn test_extract_links_unwraps_redirects() {
        let html = r#"
            <a href="/url?q=https%3A%2F%2Fexample.com%2Fstory&sa=U">Google</a>
            <a href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fnews.example.org%2Fitem&rut=abc">DDG</a>
            <a href="https://direct.example.net/a">Direct</a>
            <a href="/relative/path">Relative</a>
            <a href="javascript:void(0)">JS</a>
        "#;

        let links = extract_links(html, "a");

        assert!(links.contains(&"https://example.com/story".to_string()));
        assert!(links.contains(&"https://news.example.org/item".to_string()));
        assert!(links.contains(&"https://direct.example.net/a".to_string()));
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn test_clean_text() {
        let dirty = "Some\u{0000} text\u{0007} with  [ad block]   artefacts — fine.";
        let cleaned = clean_text(dirty);
        assert_eq!(cleaned, "Some text with artefacts — fine.");
    }

    #[test]
    fn test_clean_text_preserves_punctuation() {
        let text = "Prices rose 5% (to $10), officials said: \"stable\".";
        assert_eq!(clean_text(text), text);
    }

    #[test]
    fn test_is_valid_content() {
        assert!(!is_valid_content("too short"));
        let long = "This is a perfectly readable sentence about an event. ".repeat(5);
        assert!(is_valid_content(&long));
    }
}
