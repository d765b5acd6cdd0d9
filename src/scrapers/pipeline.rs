//! Per-field extraction strategy chains.
//!
//! Every strategy is a pure function from the document snapshot to an
//! optional value. Chains run in fixed priority order and commit to the
//! first non-empty result; a strategy that finds nothing is an empty
//! result, never an error.

use regex::Regex;
use scraper::ElementRef;
use tracing::debug;

use crate::models::ArticleRecord;
use crate::normalize::normalize_bullet_lines;
use crate::scrapers::dquery::{self, normalize_label, DocumentQuery};

/// Ancestor levels searched when widening around a Benefits label.
const CONTAINER_HOP_BUDGET: usize = 6;

/// True for the generic site title served before the article renders.
pub fn is_generic_title(text: &str) -> bool {
    let t = normalize_label(text);
    t.starts_with("wipo green") || t.starts_with("wipogreen") || t.ends_with("wipogreen database")
}

/// Run one field's strategies in order; first non-empty result wins.
fn run_chain(field: &str, strategies: &[(&str, &dyn Fn() -> Option<String>)]) -> String {
    for (name, strategy) in strategies {
        if let Some(value) = strategy() {
            let value = value.trim().to_string();
            if !value.is_empty() {
                debug!("Field {} resolved via {} strategy", field, name);
                return value;
            }
        }
    }
    String::new()
}

fn join_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct FieldPipeline {
    id_pattern: Regex,
    panel_benefits: Regex,
    panel_benefits_description: Regex,
    container_benefits: Regex,
    container_benefits_description: Regex,
}

impl Default for FieldPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldPipeline {
    pub fn new() -> Self {
        Self {
            id_pattern: Regex::new(r"(?i)\bID\s*(\d{3,})\b").unwrap(),
            panel_benefits: Regex::new(
                r"(?i)Benefits\s*\n+([^\n]+?)(?:\n+Benefits\s*Description|\n+Additional\s*Information|$)",
            )
            .unwrap(),
            panel_benefits_description: Regex::new(
                r"(?is)Benefits\s*Description\s*\n+(.*?)(?:\n\s*\n|\n+Additional\s*Information|$)",
            )
            .unwrap(),
            container_benefits: Regex::new(r"(?is)Benefits\s*(.*?)(?:Benefits\s*Description|$)")
                .unwrap(),
            container_benefits_description: Regex::new(r"(?is)Benefits\s*Description\s*(.*?)$")
                .unwrap(),
        }
    }

    /// Run every field chain against the snapshot.
    pub fn extract(&self, doc: &DocumentQuery) -> ArticleRecord {
        let mut record = ArticleRecord::default();

        record.technology_name_en = run_chain(
            "technologyNameEN",
            &[
                ("heading", &|| {
                    doc.heading_texts()
                        .into_iter()
                        .find(|t| !is_generic_title(t))
                }),
                ("og:title", &|| {
                    doc.meta_property("og:title")
                        .filter(|t| !is_generic_title(t))
                }),
                ("document-title", &|| doc.document_title()),
            ],
        );

        record.id = self
            .id_pattern
            .captures(doc.body_text())
            .map(|caps| caps[1].to_string())
            .unwrap_or_default();

        record.company_name = run_chain(
            "companyName",
            &[
                ("owner-label", &|| doc.value_by_label("Owner")),
                ("applicant-label", &|| doc.value_by_label("Applicant")),
            ],
        );
        record.published_date = doc.value_by_label("Published").unwrap_or_default();
        record.updated_date = doc.value_by_label("Updated").unwrap_or_default();
        record.company_website_url = doc
            .anchor_href_by_text("Visit Website")
            .unwrap_or_default();
        record.technology_image_url = doc.hero_image().unwrap_or_default();
        record.description = doc.section_text("Description").unwrap_or_default();

        let (benefits, benefits_description) = self.benefits(doc);
        record.benefits = benefits;
        record.benefits_description = benefits_description;

        let panel = doc.panel_for("Additional Information");
        record.developed_in_country = self.additional_value(doc, panel, &["Developed in"]);
        record.deployed_in_country = self.additional_value(doc, panel, &["Deployed in"]);
        record.technology_readiness_level = self.additional_value(
            doc,
            panel,
            &["Readiness level (TRL)", "Readiness level", "TRL"],
        );
        record.intellectual_property = self.intellectual_property(doc, panel);

        record
    }

    /// Benefits and Benefits Description, treated specially for their
    /// observed fragility: label-adjacent value in the panel, then a
    /// label/value regex pair over the panel text, then the same pair over
    /// a widening ancestor container, then the plain section body.
    fn benefits(&self, doc: &DocumentQuery) -> (String, String) {
        let panel = doc.panel_for("Benefits");
        let panel_text = panel.map(dquery::plain_text).unwrap_or_default();

        let mut benefits = run_chain(
            "benefits",
            &[
                ("panel-label", &|| {
                    panel.and_then(|p| doc.value_by_label_in(p, "Benefits"))
                }),
                ("panel-regex", &|| {
                    self.panel_benefits
                        .captures(&panel_text)
                        .map(|caps| caps[1].trim().to_string())
                }),
            ],
        );
        let mut benefits_description = run_chain(
            "benefitsDescription",
            &[
                ("panel-bullets", &|| {
                    panel.and_then(|p| doc.bullets_below(p, "Benefits Description"))
                }),
                ("panel-label", &|| {
                    panel.and_then(|p| doc.value_by_label_in(p, "Benefits Description"))
                }),
                ("panel-regex", &|| {
                    self.panel_benefits_description
                        .captures(&panel_text)
                        .map(|caps| join_lines(&caps[1]))
                }),
            ],
        );

        if benefits.is_empty() || benefits_description.is_empty() {
            let (from_container, description_from_container) = self.container_search(doc);
            if benefits.is_empty() {
                if let Some(value) = from_container {
                    benefits = value;
                }
            }
            if benefits_description.is_empty() {
                if let Some(value) = description_from_container {
                    benefits_description = value;
                }
            }
        }

        // Some articles render Benefits as a bare section body with no
        // label nodes at all. Only usable when the text cannot be the
        // description block in disguise.
        if benefits.is_empty() {
            if let Some(text) = doc.section_text("Benefits") {
                if !text.to_lowercase().contains("benefits description") {
                    debug!("Field benefits resolved via section-body strategy");
                    benefits = text;
                }
            }
        }

        (benefits, benefits_description)
    }

    /// Widen around any non-control element reading exactly "Benefits"
    /// until an ancestor also contains "Benefits Description", then apply
    /// the label/value regex pair there.
    fn container_search(&self, doc: &DocumentQuery) -> (Option<String>, Option<String>) {
        for el in doc.elements_with_exact_text("Benefits", &["button", "a"]) {
            let mut node: Option<ElementRef> = Some(el);
            let mut hops = 0;
            while let Some(current) = node {
                if hops >= CONTAINER_HOP_BUDGET {
                    break;
                }
                let text = dquery::plain_text(current);
                if text.to_lowercase().contains("benefits description") {
                    let benefits = self
                        .container_benefits
                        .captures(&text)
                        .map(|caps| caps[1].trim().to_string())
                        .filter(|v| !v.is_empty());
                    let description = self
                        .container_benefits_description
                        .captures(&text)
                        .map(|caps| normalize_bullet_lines(caps[1].trim()))
                        .filter(|v| !v.is_empty());
                    if benefits.is_some() || description.is_some() {
                        return (benefits, description);
                    }
                }
                node = dquery::parent_element(current);
                hops += 1;
            }
        }
        (None, None)
    }

    /// Additional Information lookup: two-cell rows in the panel first,
    /// then the generic label scan.
    fn additional_value(
        &self,
        doc: &DocumentQuery,
        panel: Option<ElementRef<'_>>,
        labels: &[&str],
    ) -> String {
        for label in labels {
            if let Some(p) = panel {
                if let Some(value) = doc.labelled_row_value(p, label) {
                    return value;
                }
                if let Some(value) = doc.value_by_label_in(p, label) {
                    return value;
                }
            } else if let Some(value) = doc.value_by_label(label) {
                return value;
            }
        }
        String::new()
    }

    /// Intellectual property additionally falls back to a heading followed
    /// by a block when no label/value row matches.
    fn intellectual_property(
        &self,
        doc: &DocumentQuery,
        panel: Option<ElementRef<'_>>,
    ) -> String {
        if let Some(p) = panel {
            if let Some(value) = doc.labelled_row_value(p, "Intellectual property") {
                return value;
            }
            if let Some(value) = doc.value_by_label_in(p, "Intellectual property") {
                return value;
            }
            if let Some(value) = doc.heading_block_value(p, "Intellectual property") {
                return value;
            }
        } else if let Some(value) = doc.value_by_label("Intellectual property") {
            return value;
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://wipogreen.wipo.int/wipogreen-database/articles/176426";

    fn extract(body: &str) -> ArticleRecord {
        let html = format!("<html><head></head><body>{body}</body></html>");
        let doc = DocumentQuery::parse(&html, PAGE_URL);
        FieldPipeline::new().extract(&doc)
    }

    #[test]
    fn test_generic_title_detection() {
        assert!(is_generic_title("WIPO GREEN"));
        assert!(is_generic_title("WipoGreen Database"));
        assert!(!is_generic_title("Example Turbine"));
    }

    #[test]
    fn test_title_prefers_non_generic_heading() {
        let record = extract("<h1>WIPO Green</h1><h1>Example Turbine</h1>");
        assert_eq!(record.technology_name_en, "Example Turbine");
    }

    #[test]
    fn test_title_falls_back_to_og_title() {
        let html = concat!(
            r#"<html><head><meta property="og:title" content="Storm-proof Blades">"#,
            "<title>WIPO Green</title></head><body><h1>WIPO Green</h1></body></html>"
        );
        let doc = DocumentQuery::parse(html, PAGE_URL);
        let record = FieldPipeline::new().extract(&doc);
        assert_eq!(record.technology_name_en, "Storm-proof Blades");
    }

    #[test]
    fn test_title_uses_document_title_last() {
        let html = concat!(
            "<html><head><title>Fallback Name</title></head>",
            "<body><h1>WIPO Green</h1></body></html>"
        );
        let doc = DocumentQuery::parse(html, PAGE_URL);
        let record = FieldPipeline::new().extract(&doc);
        assert_eq!(record.technology_name_en, "Fallback Name");
    }

    #[test]
    fn test_identifier_from_body_text() {
        let record = extract("<p>Some header</p><p>ID 176426</p>");
        assert_eq!(record.id, "176426");
        let record = extract("<p>ID 12</p>");
        assert_eq!(record.id, "");
    }

    #[test]
    fn test_label_value_fields() {
        let record = extract(
            "<div><strong>Owner</strong><span>Acme Wind Co</span></div>\
             <div><strong>Published</strong><span>2023/08/14</span></div>\
             <div><strong>Updated</strong><span>2024/01/02</span></div>",
        );
        assert_eq!(record.company_name, "Acme Wind Co");
        assert_eq!(record.published_date, "2023/08/14");
        assert_eq!(record.updated_date, "2024/01/02");
    }

    #[test]
    fn test_company_name_falls_back_to_applicant() {
        let record = extract("<div><strong>Applicant</strong><span>Turbine Labs</span></div>");
        assert_eq!(record.company_name, "Turbine Labs");
    }

    #[test]
    fn test_benefits_panel_via_aria_controls() {
        // A bare panel with no label nodes: the section body is the value.
        let record = extract(
            r#"<h1>Example Turbine</h1>
               <button aria-controls="bpanel">Benefits</button>
               <div id="bpanel"><p>Greenhouse gases, Electricity</p></div>"#,
        );
        assert_eq!(record.technology_name_en, "Example Turbine");
        assert_eq!(record.benefits, "Greenhouse gases, Electricity");
    }

    #[test]
    fn test_benefits_and_description_never_cross() {
        let record = extract(
            r#"<button aria-controls="p1">Benefits</button>
               <div id="p1">
                 <div><strong>Benefits</strong><span>Electricity</span></div>
                 <div><strong>Benefits Description</strong><span>- Lower cost</span></div>
               </div>"#,
        );
        assert_eq!(record.benefits, "Electricity");
        assert_eq!(record.benefits_description, "Lower cost");
        assert!(!record.benefits.contains("Lower cost"));
        assert!(!record.benefits_description.contains("Electricity"));
    }

    #[test]
    fn test_benefits_panel_regex_over_plain_text() {
        let record = extract(
            r#"<button aria-controls="p1">Benefits</button>
               <div id="p1">Benefits<br>Greenhouse gases<br>Benefits Description<br>- Cuts CO2</div>"#,
        );
        assert_eq!(record.benefits, "Greenhouse gases");
        assert_eq!(record.benefits_description, "- Cuts CO2");
    }

    #[test]
    fn test_benefits_container_widening() {
        let record = extract(
            "<section>\
               <div><span>Benefits</span></div>\
               <div>Improved safety</div>\
               <div><span>Benefits Description</span></div>\
               <div>- Less downtime - Safer work</div>\
             </section>",
        );
        assert_eq!(record.benefits, "Improved safety");
        assert_eq!(record.benefits_description, "Less downtime\nSafer work");
    }

    #[test]
    fn test_additional_information_rows() {
        let record = extract(
            r#"<button aria-controls="add">Additional Information</button>
               <div id="add"><table>
                 <tr><th>Developed in</th><td>Japan</td></tr>
                 <tr><th>Deployed in</th><td>Philippines</td></tr>
                 <tr><th>Readiness level (TRL)</th><td>TRL 7</td></tr>
                 <tr><th>Intellectual property</th><td>Patent pending</td></tr>
               </table></div>"#,
        );
        assert_eq!(record.developed_in_country, "Japan");
        assert_eq!(record.deployed_in_country, "Philippines");
        assert_eq!(record.technology_readiness_level, "TRL 7");
        assert_eq!(record.intellectual_property, "Patent pending");
    }

    #[test]
    fn test_intellectual_property_without_label_rows() {
        let record = extract(
            r#"<button aria-controls="add">Additional Information</button>
               <div id="add">
                 <div><h4>Intellectual property</h4></div>
                 <div>Granted patent JP1234567</div>
               </div>"#,
        );
        assert_eq!(record.intellectual_property, "Granted patent JP1234567");
    }

    #[test]
    fn test_website_and_image() {
        let html = concat!(
            r#"<html><head><meta property="og:image" content="/assets/hero.jpg"></head>"#,
            r#"<body><a href="/redirect/acme">Visit Website</a></body></html>"#
        );
        let doc = DocumentQuery::parse(html, PAGE_URL);
        let record = FieldPipeline::new().extract(&doc);
        assert_eq!(
            record.company_website_url,
            "https://wipogreen.wipo.int/redirect/acme"
        );
        assert_eq!(
            record.technology_image_url,
            "https://wipogreen.wipo.int/assets/hero.jpg"
        );
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        let record = extract("<p>Nothing to see here</p>");
        assert_eq!(record.technology_name_en, "");
        assert_eq!(record.benefits, "");
        assert_eq!(record.developed_in_country, "");
    }
}
