//! Cross-source reconciliation of the DOM pass with captured payloads.
//!
//! Recorded JSON payloads are walked depth-first for any object whose
//! identifier suffix-matches the record's id; matching objects fill only
//! fields the DOM pass left empty. DOM-derived values always win.

use serde_json::Value;
use tracing::debug;

use crate::models::ArticleRecord;
use crate::scrapers::pipeline::is_generic_title;
use crate::scrapers::recorder::NetworkPayload;

/// Keys an article-like object may expose its identifier under.
const ID_KEYS: &[&str] = &["id", "articleId", "article_id"];

/// True when the DOM pass left enough gaps to justify payload scanning.
pub fn needs_reconciliation(record: &ArticleRecord) -> bool {
    record.description.is_empty()
        || record.benefits.is_empty()
        || record.technology_name_en.is_empty()
        || is_generic_title(&record.technology_name_en)
}

/// Merge every matching payload object into the record's empty fields.
pub fn reconcile(record: &mut ArticleRecord, payloads: &[NetworkPayload]) {
    if record.id.is_empty() {
        debug!("No article id extracted; skipping payload correlation");
        return;
    }
    for payload in payloads {
        let Ok(data) = serde_json::from_str::<Value>(&payload.body) else {
            debug!("Skipping unparsable payload from {}", payload.url);
            continue;
        };
        let mut stack = vec![&data];
        while let Some(value) = stack.pop() {
            match value {
                Value::Object(map) => {
                    if object_matches_id(map, &record.id) {
                        debug!("Payload object from {} matches article id", payload.url);
                        fill_from(record, map);
                    }
                    stack.extend(map.values());
                }
                Value::Array(items) => stack.extend(items),
                _ => {}
            }
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn object_matches_id(map: &serde_json::Map<String, Value>, id: &str) -> bool {
    ID_KEYS.iter().any(|key| {
        map.get(*key)
            .and_then(scalar_string)
            .map(|candidate| candidate.ends_with(id))
            .unwrap_or(false)
    })
}

fn fill(slot: &mut String, map: &serde_json::Map<String, Value>, keys: &[&str]) {
    if !slot.is_empty() {
        return;
    }
    for key in keys {
        if let Some(value) = map.get(*key).and_then(scalar_string) {
            *slot = value;
            return;
        }
    }
}

fn fill_from(record: &mut ArticleRecord, map: &serde_json::Map<String, Value>) {
    fill(&mut record.description, map, &["description", "longDescription"]);
    fill(&mut record.benefits, map, &["benefits"]);
    fill(
        &mut record.technology_name_en,
        map,
        &["title", "name", "technologyName"],
    );
    fill(
        &mut record.technology_readiness_level,
        map,
        &["trl", "readiness"],
    );
    fill(&mut record.developed_in_country, map, &["developedIn"]);
    fill(&mut record.deployed_in_country, map, &["deployedIn"]);
    fill(
        &mut record.intellectual_property,
        map,
        &["intellectualProperty"],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(body: &str) -> NetworkPayload {
        NetworkPayload {
            url: "https://api.example/articles".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_fills_empty_fields_from_matching_payload() {
        let mut record = ArticleRecord {
            id: "99123".to_string(),
            ..Default::default()
        };
        let payloads = vec![payload(
            r#"{ "id": "99123", "description": "Fallback description", "benefits": "Cleaner air" }"#,
        )];
        reconcile(&mut record, &payloads);
        assert_eq!(record.description, "Fallback description");
        assert_eq!(record.benefits, "Cleaner air");
    }

    #[test]
    fn test_never_overwrites_dom_values() {
        let mut record = ArticleRecord {
            id: "99123".to_string(),
            description: "From the DOM".to_string(),
            ..Default::default()
        };
        let payloads = vec![payload(
            r#"{ "id": 99123, "description": "From the payload" }"#,
        )];
        reconcile(&mut record, &payloads);
        assert_eq!(record.description, "From the DOM");
    }

    #[test]
    fn test_id_comparison_is_suffix_match() {
        let mut record = ArticleRecord {
            id: "99123".to_string(),
            ..Default::default()
        };
        let payloads = vec![payload(
            r#"{ "articleId": "wipo-99123", "description": "Suffix matched" }"#,
        )];
        reconcile(&mut record, &payloads);
        assert_eq!(record.description, "Suffix matched");
    }

    #[test]
    fn test_ignores_non_matching_objects() {
        let mut record = ArticleRecord {
            id: "99123".to_string(),
            ..Default::default()
        };
        let payloads = vec![payload(
            r#"{ "id": "55555", "description": "Someone else's article" }"#,
        )];
        reconcile(&mut record, &payloads);
        assert_eq!(record.description, "");
    }

    #[test]
    fn test_walks_nested_structures() {
        let mut record = ArticleRecord {
            id: "176426".to_string(),
            ..Default::default()
        };
        let payloads = vec![payload(
            r#"{ "data": { "results": [ { "id": 176426, "trl": 7, "developedIn": "Japan" } ] } }"#,
        )];
        reconcile(&mut record, &payloads);
        assert_eq!(record.technology_readiness_level, "7");
        assert_eq!(record.developed_in_country, "Japan");
    }

    #[test]
    fn test_requires_an_extracted_id() {
        let mut record = ArticleRecord::default();
        let payloads = vec![payload(r#"{ "id": "1", "description": "anything" }"#)];
        reconcile(&mut record, &payloads);
        assert_eq!(record.description, "");
    }

    #[test]
    fn test_needs_reconciliation_gating() {
        let mut record = ArticleRecord {
            technology_name_en: "Example Turbine".to_string(),
            description: "text".to_string(),
            benefits: "value".to_string(),
            ..Default::default()
        };
        assert!(!needs_reconciliation(&record));

        record.benefits.clear();
        assert!(needs_reconciliation(&record));

        record.benefits = "value".to_string();
        record.technology_name_en = "WIPO Green".to_string();
        assert!(needs_reconciliation(&record));
    }
}
