//! Fixed-capability queries over the rendered document snapshot.
//!
//! Extraction strategies consume this interface instead of raw engine
//! APIs, so the pipeline stays portable across automation backends. All
//! label matching is exact-text after trimming and lowercasing, never
//! substring: a lookup for "Benefits" must not match a "Benefits
//! Description" node.

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::scrapers::panels::KNOWN_SECTIONS;

/// Elements that may carry a field label.
const LABEL_SELECTOR: &str = "dt, strong, b, span, div, th, h4, h5";

/// Forward-sibling step budget when reading a section after its heading.
const SIBLING_WALK_BUDGET: usize = 12;

/// Labels that terminate a plain-text body slice.
const SLICE_STOP_LABELS: &[&str] = &[
    "benefits",
    "additional information",
    "owner",
    "published",
    "updated",
];

struct Selectors {
    main_headings: Selector,
    sub_headings: Selector,
    meta: Selector,
    title: Selector,
    labels: Selector,
    anchors: Selector,
    main_images: Selector,
    images: Selector,
    toggles: Selector,
    tabpanels: Selector,
    with_id: Selector,
    blocks: Selector,
    heading_like: Selector,
    rows: Selector,
    lists: Selector,
    items: Selector,
    everything: Selector,
}

impl Selectors {
    fn new() -> Self {
        let sel = |s: &str| Selector::parse(s).unwrap();
        Self {
            main_headings: sel("main h1, article h1, h1"),
            sub_headings: sel("main h2, article h2, h2"),
            meta: sel("meta[property]"),
            title: sel("title"),
            labels: sel(LABEL_SELECTOR),
            anchors: sel("a"),
            main_images: sel("main img, article img"),
            images: sel("img"),
            toggles: sel(r#"button[aria-controls], [role="button"][aria-controls]"#),
            tabpanels: sel(r#"[role="tabpanel"]"#),
            with_id: sel("[id]"),
            blocks: sel("p, li"),
            heading_like: sel("h1, h2, h3, h4, h5, h6, strong"),
            rows: sel(r#".p-grid, [class*="p-grid"], .row, tr"#),
            lists: sel("ul, ol"),
            items: sel("li"),
            everything: sel("*"),
        }
    }
}

/// A parsed snapshot of the rendered page, plus its plain-text rendering.
pub struct DocumentQuery {
    html: Html,
    base_url: Option<Url>,
    body_text: String,
    sel: Selectors,
}

impl DocumentQuery {
    pub fn parse(html: &str, page_url: &str) -> Self {
        let html = Html::parse_document(html);
        let body_text = plain_text(html.root_element());
        Self {
            html,
            base_url: Url::parse(page_url).ok(),
            body_text,
            sel: Selectors::new(),
        }
    }

    /// Plain-text rendering of the whole document, block-aware.
    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    /// Visible heading texts: h1 candidates first, then h2.
    pub fn heading_texts(&self) -> Vec<String> {
        let mut out = Vec::new();
        for selector in [&self.sel.main_headings, &self.sel.sub_headings] {
            for el in self.html.select(selector) {
                let text = element_text(el);
                if !text.is_empty() && !out.contains(&text) {
                    out.push(text);
                }
            }
        }
        out
    }

    /// Content of a `<meta property=...>` tag, e.g. `og:title`.
    pub fn meta_property(&self, property: &str) -> Option<String> {
        for el in self.html.select(&self.sel.meta) {
            if el.value().attr("property") == Some(property) {
                let content = el.value().attr("content").unwrap_or("").trim();
                if !content.is_empty() {
                    return Some(content.to_string());
                }
            }
        }
        None
    }

    pub fn document_title(&self) -> Option<String> {
        self.html
            .select(&self.sel.title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    }

    /// Exact-label lookup over label-bearing elements: value from the
    /// following sibling, else another child of the same parent, else a
    /// `label: value` regex over the plain-text body.
    pub fn value_by_label(&self, label: &str) -> Option<String> {
        let needle = normalize_label(label);
        for el in self.html.select(&self.sel.labels) {
            if normalize_label(&element_text(el)) != needle {
                continue;
            }
            if let Some(value) = sibling_value(el, &needle) {
                return Some(value);
            }
        }
        self.body_label_value(label)
    }

    /// Same lookup scoped to a panel, without the body-text fallback.
    pub fn value_by_label_in(&self, panel: ElementRef<'_>, label: &str) -> Option<String> {
        let needle = normalize_label(label);
        for el in panel.select(&self.sel.labels) {
            if normalize_label(&element_text(el)) != needle {
                continue;
            }
            if let Some(value) = sibling_value(el, &needle) {
                return Some(value);
            }
        }
        None
    }

    fn body_label_value(&self, label: &str) -> Option<String> {
        let pattern = format!(r"(?i){}\s*:?\s*([^\n]+)", regex::escape(label));
        let re = Regex::new(&pattern).ok()?;
        re.captures(&self.body_text)
            .map(|caps| caps[1].trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// First anchor whose visible text contains `text` as a whole phrase,
    /// case- and whitespace-insensitive; href resolved absolute.
    pub fn anchor_href_by_text(&self, text: &str) -> Option<String> {
        let needle = normalize_label(text);
        for anchor in self.html.select(&self.sel.anchors) {
            let visible = normalize_label(&element_text(anchor));
            if visible.is_empty() {
                continue;
            }
            let padded = format!(" {} ", visible);
            if !padded.contains(&format!(" {} ", needle)) {
                continue;
            }
            if let Some(href) = anchor.value().attr("href") {
                if !href.is_empty() {
                    return Some(self.resolve_url(href));
                }
            }
        }
        None
    }

    /// `og:image`, else the first sufficiently large image under the main
    /// content region, else the first image found at all.
    pub fn hero_image(&self) -> Option<String> {
        if let Some(og) = self.meta_property("og:image") {
            return Some(self.resolve_url(&og));
        }
        for selector in [&self.sel.main_images, &self.sel.images] {
            let mut first = None;
            for img in self.html.select(selector) {
                let src = img.value().attr("src").unwrap_or("");
                if src.is_empty() {
                    continue;
                }
                if first.is_none() {
                    first = Some(src);
                }
                let width = dimension(img, "width");
                let height = dimension(img, "height");
                if width >= 300 || height >= 200 {
                    return Some(self.resolve_url(src));
                }
            }
            if let Some(src) = first {
                return Some(self.resolve_url(src));
            }
        }
        None
    }

    /// The content container a section's toggle control points at, via the
    /// `aria-controls` relationship, else a `tabpanel` labelled by it.
    pub fn panel_for(&self, section: &str) -> Option<ElementRef<'_>> {
        let needle = normalize_label(section);
        for toggle in self.html.select(&self.sel.toggles) {
            if normalize_label(&element_text(toggle)) != needle {
                continue;
            }
            if let Some(id) = toggle.value().attr("aria-controls") {
                if let Some(panel) = self.element_by_id(id) {
                    return Some(panel);
                }
            }
        }
        for tabpanel in self.html.select(&self.sel.tabpanels) {
            let Some(label_id) = tabpanel.value().attr("aria-labelledby") else {
                continue;
            };
            let Some(label) = self.element_by_id(label_id) else {
                continue;
            };
            if normalize_label(&element_text(label)).contains(&needle) {
                return Some(tabpanel);
            }
        }
        None
    }

    fn element_by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.html
            .select(&self.sel.with_id)
            .find(|el| el.value().attr("id") == Some(id))
    }

    /// Three-tier section body text: panel paragraphs, heading walk, body
    /// slice. Empty when all three come up dry.
    pub fn section_text(&self, section: &str) -> Option<String> {
        if let Some(panel) = self.panel_for(section) {
            let parts: Vec<String> = panel
                .select(&self.sel.blocks)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect();
            if !parts.is_empty() {
                return Some(parts.join("\n"));
            }
            let whole = plain_text(panel);
            let whole = whole.trim();
            if !whole.is_empty() {
                return Some(whole.to_string());
            }
        }
        if let Some(text) = self.heading_section_text(section) {
            return Some(text);
        }
        self.body_slice(section)
    }

    /// Exact heading match, then forward sibling walk bounded by
    /// [`SIBLING_WALK_BUDGET`], stopping at any other known section name.
    fn heading_section_text(&self, section: &str) -> Option<String> {
        let needle = normalize_label(section);
        for heading in self.html.select(&self.sel.heading_like) {
            if normalize_label(&element_text(heading)) != needle {
                continue;
            }
            let mut parts = Vec::new();
            let mut current = next_element(heading);
            let mut steps = 0;
            while let Some(el) = current {
                if steps >= SIBLING_WALK_BUDGET {
                    break;
                }
                let text = element_text(el);
                let norm = normalize_label(&text);
                if norm != needle && KNOWN_SECTIONS.iter().any(|s| normalize_label(s) == norm) {
                    break;
                }
                if !text.is_empty() {
                    parts.push(text);
                }
                current = next_element(el);
                steps += 1;
            }
            if !parts.is_empty() {
                return Some(parts.join("\n"));
            }
        }
        None
    }

    /// Last resort: slice the plain-text body after the label's first
    /// occurrence, stopping at the nearest other known label.
    fn body_slice(&self, section: &str) -> Option<String> {
        let needle = section.trim().to_lowercase();
        let label_re = Regex::new(&format!(r"(?i){}", regex::escape(&needle))).ok()?;
        let after = &self.body_text[label_re.find(&self.body_text)?.end()..];

        let mut end = after.len();
        for stop in SLICE_STOP_LABELS {
            if *stop == needle {
                continue;
            }
            if let Some(found) = Regex::new(&format!(r"(?i){}", regex::escape(stop)))
                .ok()
                .and_then(|re| re.find(after))
            {
                end = end.min(found.start());
            }
        }
        let slice = after[..end].trim();
        if slice.is_empty() {
            None
        } else {
            Some(slice.to_string())
        }
    }

    /// Two-cell row scan: first cell equals the label, second carries the
    /// value.
    pub fn labelled_row_value(&self, panel: ElementRef<'_>, label: &str) -> Option<String> {
        let needle = normalize_label(label);
        for row in panel.select(&self.sel.rows) {
            let cells: Vec<ElementRef> = row
                .children()
                .filter_map(ElementRef::wrap)
                .collect();
            if cells.len() < 2 {
                continue;
            }
            if normalize_label(&element_text(cells[0])) != needle {
                continue;
            }
            let value = element_text(cells[1]);
            let value = if value.is_empty() {
                element_text(cells[cells.len() - 1])
            } else {
                value
            };
            if !value.is_empty() {
                return Some(value);
            }
        }
        None
    }

    /// Heading followed by a block: the heading's parent's next sibling,
    /// else the heading's own next sibling.
    pub fn heading_block_value(&self, panel: ElementRef<'_>, label: &str) -> Option<String> {
        let needle = normalize_label(label);
        for heading in panel.select(&self.sel.heading_like) {
            if normalize_label(&element_text(heading)) != needle {
                continue;
            }
            let block = parent_element(heading)
                .and_then(next_element)
                .or_else(|| next_element(heading));
            if let Some(block) = block {
                let text = plain_text(block);
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
        None
    }

    /// List items below a label heading: a `ul`/`ol` within the heading's
    /// parent, else dash-prefixed sibling blocks.
    pub fn bullets_below(&self, panel: ElementRef<'_>, label: &str) -> Option<String> {
        let needle = normalize_label(label);
        for heading in panel.select(&self.sel.heading_like) {
            if normalize_label(&element_text(heading)) != needle {
                continue;
            }
            if let Some(parent) = parent_element(heading) {
                if let Some(list) = parent.select(&self.sel.lists).next() {
                    let items: Vec<String> = list
                        .select(&self.sel.items)
                        .map(element_text)
                        .filter(|t| !t.is_empty())
                        .collect();
                    if !items.is_empty() {
                        return Some(items.join("\n"));
                    }
                }
            }
            let mut items = Vec::new();
            let mut current = next_element(heading);
            let mut steps = 0;
            while let Some(el) = current {
                if steps >= SIBLING_WALK_BUDGET {
                    break;
                }
                let text = element_text(el);
                if let Some(stripped) = text.strip_prefix('-') {
                    let stripped = stripped.trim();
                    if !stripped.is_empty() {
                        items.push(stripped.to_string());
                    }
                }
                current = next_element(el);
                steps += 1;
            }
            if !items.is_empty() {
                return Some(items.join("\n"));
            }
        }
        None
    }

    /// Every element whose trimmed text equals `text` exactly, skipping the
    /// given tag names (toggle controls are not content).
    pub fn elements_with_exact_text(
        &self,
        text: &str,
        skip_tags: &[&str],
    ) -> Vec<ElementRef<'_>> {
        let needle = normalize_label(text);
        self.html
            .select(&self.sel.everything)
            .filter(|el| !skip_tags.contains(&el.value().name()))
            .filter(|el| normalize_label(&element_text(*el)) == needle)
            .collect()
    }

    /// Resolve an href against the page's own URL.
    pub fn resolve_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        match &self.base_url {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|e| {
                    debug!("Could not resolve {:?}: {}", href, e);
                    href.to_string()
                }),
            None => href.to_string(),
        }
    }
}

/// Trimmed, whitespace-collapsed, lowercased text for exact-label matching.
pub fn normalize_label(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whitespace-collapsed single-line text of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Next sibling that is an element.
pub fn next_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

/// Parent, when it is an element.
pub fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

fn sibling_value(el: ElementRef<'_>, label_norm: &str) -> Option<String> {
    if let Some(sibling) = next_element(el) {
        let value = element_text(sibling);
        if !value.is_empty() && normalize_label(&value) != label_norm {
            return Some(value);
        }
    }
    let parent = parent_element(el)?;
    for child in parent.children().filter_map(ElementRef::wrap) {
        if child.id() == el.id() {
            continue;
        }
        let value = element_text(child);
        if !value.is_empty() && normalize_label(&value) != label_norm {
            return Some(value);
        }
    }
    None
}

fn dimension(img: ElementRef<'_>, attr: &str) -> u32 {
    img.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "th", "thead",
    "tr", "ul",
];

const SKIP_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Plain-text rendering with newlines at block boundaries, approximating
/// what the browser reports as the element's inner text.
pub fn plain_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(el, &mut raw);

    // Trim each line, drop horizontal whitespace runs, cap blank runs at one.
    let mut out = String::new();
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out.trim_matches('\n').to_string()
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                let name = element.name();
                if SKIP_TAGS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://wipogreen.wipo.int/wipogreen-database/articles/176426";

    fn doc(body: &str) -> DocumentQuery {
        let html = format!("<html><head></head><body>{body}</body></html>");
        DocumentQuery::parse(&html, PAGE_URL)
    }

    #[test]
    fn test_value_by_label_reads_following_sibling() {
        let d = doc("<div><strong>Owner</strong><span>Acme Wind Co</span></div>");
        assert_eq!(d.value_by_label("Owner").as_deref(), Some("Acme Wind Co"));
    }

    #[test]
    fn test_value_by_label_is_exact_not_substring() {
        let d = doc(
            "<div><strong>Benefits Description</strong><span>- Lower cost</span></div>\
             <div><strong>Benefits</strong><span>Electricity</span></div>",
        );
        assert_eq!(d.value_by_label("Benefits").as_deref(), Some("Electricity"));
        assert_eq!(
            d.value_by_label("Benefits Description").as_deref(),
            Some("- Lower cost")
        );
    }

    #[test]
    fn test_value_by_label_falls_back_to_body_regex() {
        let d = doc("<p>Published: 2023/08/14 by the uploader</p>");
        assert_eq!(
            d.value_by_label("Published").as_deref(),
            Some("2023/08/14 by the uploader")
        );
    }

    #[test]
    fn test_value_by_label_case_insensitive() {
        let d = doc("<div><b>OWNER</b><span>Acme</span></div>");
        assert_eq!(d.value_by_label("Owner").as_deref(), Some("Acme"));
    }

    #[test]
    fn test_anchor_href_by_text_resolves_relative() {
        let d = doc(r#"<a href="/out/site">  Visit   Website </a>"#);
        assert_eq!(
            d.anchor_href_by_text("Visit Website").as_deref(),
            Some("https://wipogreen.wipo.int/out/site")
        );
    }

    #[test]
    fn test_anchor_href_by_text_matches_phrase_in_longer_text() {
        let d = doc(r#"<a href="https://acme.example">Go and visit website now</a>"#);
        assert_eq!(
            d.anchor_href_by_text("Visit Website").as_deref(),
            Some("https://acme.example")
        );
    }

    #[test]
    fn test_hero_image_prefers_og_image() {
        let html = concat!(
            r#"<html><head><meta property="og:image" content="https://cdn.example/hero.jpg">"#,
            r#"</head><body><img src="/small.png" width="10"></body></html>"#
        );
        let d = DocumentQuery::parse(html, PAGE_URL);
        assert_eq!(
            d.hero_image().as_deref(),
            Some("https://cdn.example/hero.jpg")
        );
    }

    #[test]
    fn test_hero_image_picks_first_large_image() {
        let d = doc(
            r#"<main><img src="/icon.png" width="16" height="16">
               <img src="/hero.jpg" width="640" height="360">
               <img src="/other.jpg" width="800"></main>"#,
        );
        assert_eq!(
            d.hero_image().as_deref(),
            Some("https://wipogreen.wipo.int/hero.jpg")
        );
    }

    #[test]
    fn test_hero_image_falls_back_to_first_image() {
        let d = doc(r#"<main><img src="/only.png" width="20"></main>"#);
        assert_eq!(
            d.hero_image().as_deref(),
            Some("https://wipogreen.wipo.int/only.png")
        );
    }

    #[test]
    fn test_panel_for_follows_aria_controls() {
        let d = doc(
            r#"<button aria-controls="p1">Benefits</button>
               <div id="p1"><p>Greenhouse gases, Electricity</p></div>"#,
        );
        let panel = d.panel_for("Benefits").unwrap();
        assert_eq!(panel.value().attr("id"), Some("p1"));
    }

    #[test]
    fn test_panel_for_falls_back_to_labelled_tabpanel() {
        let d = doc(
            r#"<span id="tab-3">Additional Information</span>
               <div role="tabpanel" aria-labelledby="tab-3"><p>rows</p></div>"#,
        );
        assert!(d.panel_for("Additional Information").is_some());
    }

    #[test]
    fn test_section_text_reads_panel_paragraphs() {
        let d = doc(
            r#"<button aria-controls="desc">Description</button>
               <div id="desc"><p>First paragraph.</p><p>Second paragraph.</p></div>"#,
        );
        assert_eq!(
            d.section_text("Description").as_deref(),
            Some("First paragraph.\nSecond paragraph.")
        );
    }

    #[test]
    fn test_section_text_walks_siblings_after_heading() {
        let d = doc(
            "<h3>Description</h3><p>A floating platform.</p><p>Built offshore.</p>\
             <h3>Benefits</h3><p>Cheap power.</p>",
        );
        assert_eq!(
            d.section_text("Description").as_deref(),
            Some("A floating platform.\nBuilt offshore.")
        );
    }

    #[test]
    fn test_section_text_slices_body_as_last_resort() {
        let d = doc("<div>Description A novel turbine design. Owner Acme</div>");
        assert_eq!(
            d.section_text("Description").as_deref(),
            Some("A novel turbine design.")
        );
    }

    #[test]
    fn test_labelled_row_value_reads_second_cell() {
        let d = doc(
            r#"<button aria-controls="add">Additional Information</button>
               <div id="add"><table>
                 <tr><th>Developed in</th><td>Japan</td></tr>
                 <tr><th>Deployed in</th><td>Philippines</td></tr>
               </table></div>"#,
        );
        let panel = d.panel_for("Additional Information").unwrap();
        assert_eq!(
            d.labelled_row_value(panel, "Developed in").as_deref(),
            Some("Japan")
        );
        assert_eq!(
            d.labelled_row_value(panel, "Deployed in").as_deref(),
            Some("Philippines")
        );
    }

    #[test]
    fn test_bullets_below_prefers_list_items() {
        let d = doc(
            r#"<div id="ben"><div><strong>Benefits Description</strong>
               <ul><li>Reduces emissions</li><li>Improves yield</li></ul></div></div>"#,
        );
        let panel = d.element_by_id("ben").unwrap();
        assert_eq!(
            d.bullets_below(panel, "Benefits Description").as_deref(),
            Some("Reduces emissions\nImproves yield")
        );
    }

    #[test]
    fn test_elements_with_exact_text_skips_controls() {
        let d = doc(
            r#"<button>Benefits</button><div><span>Benefits</span><span>value</span></div>"#,
        );
        let hits = d.elements_with_exact_text("Benefits", &["button", "a"]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value().name(), "span");
    }

    #[test]
    fn test_plain_text_inserts_newlines_at_blocks() {
        let d = doc("<p>One</p><div>Two<br>Three</div>");
        assert_eq!(d.body_text(), "One\nTwo\nThree");
    }

    #[test]
    fn test_plain_text_skips_script_and_style() {
        let d = doc("<p>Visible</p><script>var hidden = 1;</script><style>p{}</style>");
        assert_eq!(d.body_text(), "Visible");
    }
}
