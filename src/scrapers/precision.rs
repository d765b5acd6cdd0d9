//! Final structural-path pass for the two most brittle fields.
//!
//! Benefits and Benefits Description are re-read from the live document
//! with XPath probes after reconciliation. This is the most reliable
//! source for these two fields: a non-empty result unconditionally
//! overwrites whatever the earlier stages produced.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::models::ArticleRecord;
use crate::scrapers::ArticleSession;

const XPATH_TIMEOUT: Duration = Duration::from_secs(2);

/// Locates the last element reading exactly "Benefits" and takes its next
/// sibling's text; separately the last "Benefits Description" element and
/// the first following list (else the sibling block, one line per row).
const XPATH_SCRIPT: &str = r#"
    (() => {
        const last = (label) => {
            const xp = '(//*[normalize-space(text())="' + label + '"])';
            const snap = document.evaluate(xp, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            return snap.snapshotLength ? snap.snapshotItem(snap.snapshotLength - 1) : null;
        };
        const siblingText = (node) => {
            const sib = node && node.nextElementSibling;
            return sib ? (sib.innerText || '').trim() : '';
        };
        const followingListItems = (node) => {
            const snap = document.evaluate(
                'following::*[self::ul or self::ol][1]/li', node, null,
                XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            const items = [];
            for (let i = 0; i < snap.snapshotLength; i++) {
                const t = (snap.snapshotItem(i).innerText || '').trim();
                if (t) items.push(t);
            }
            return items;
        };

        const out = { benefits: '', benefitsDescription: '' };
        const benefitsNode = last('Benefits');
        if (benefitsNode) out.benefits = siblingText(benefitsNode);

        const descriptionNode = last('Benefits Description');
        if (descriptionNode) {
            const items = followingListItems(descriptionNode);
            if (items.length) {
                out.benefitsDescription = items.join('\n');
            } else {
                const block = siblingText(descriptionNode);
                if (block) {
                    out.benefitsDescription = block
                        .split('\n').map(s => s.trim()).filter(Boolean).join('\n');
                }
            }
        }
        return out;
    })()
"#;

/// Result of the structural pass; empty strings mean "leave it alone".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreciseBenefits {
    pub benefits: String,
    pub benefits_description: String,
}

/// Probe the live document. Timeouts and script failures yield the empty
/// result.
pub async fn refine(session: &ArticleSession) -> PreciseBenefits {
    let precise: Option<PreciseBenefits> = session
        .evaluate_with_timeout(XPATH_SCRIPT, XPATH_TIMEOUT)
        .await;
    let precise = precise.unwrap_or_default();
    if !precise.benefits.is_empty() || !precise.benefits_description.is_empty() {
        debug!("Structural pass refined the benefits fields");
    }
    precise
}

/// Non-empty precise values always win over any earlier-stage value.
pub fn apply(record: &mut ArticleRecord, precise: &PreciseBenefits) {
    let benefits = precise.benefits.trim();
    if !benefits.is_empty() {
        record.benefits = benefits.to_string();
    }
    let description = precise.benefits_description.trim();
    if !description.is_empty() {
        record.benefits_description = description.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_results_override_earlier_values() {
        let mut record = ArticleRecord {
            benefits: "from the reconciler".to_string(),
            benefits_description: "old lines".to_string(),
            ..Default::default()
        };
        let precise = PreciseBenefits {
            benefits: "Greenhouse gases, Electricity".to_string(),
            benefits_description: "Reduces emissions\nImproves yield".to_string(),
        };
        apply(&mut record, &precise);
        assert_eq!(record.benefits, "Greenhouse gases, Electricity");
        assert_eq!(
            record.benefits_description,
            "Reduces emissions\nImproves yield"
        );
    }

    #[test]
    fn test_empty_results_leave_fields_alone() {
        let mut record = ArticleRecord {
            benefits: "kept".to_string(),
            benefits_description: "also kept".to_string(),
            ..Default::default()
        };
        apply(&mut record, &PreciseBenefits::default());
        assert_eq!(record.benefits, "kept");
        assert_eq!(record.benefits_description, "also kept");
    }

    #[test]
    fn test_partial_results_override_only_their_field() {
        let mut record = ArticleRecord {
            benefits: "kept".to_string(),
            benefits_description: "replaced".to_string(),
            ..Default::default()
        };
        let precise = PreciseBenefits {
            benefits: String::new(),
            benefits_description: "- One\n- Two".to_string(),
        };
        apply(&mut record, &precise);
        assert_eq!(record.benefits, "kept");
        assert_eq!(record.benefits_description, "- One\n- Two");
    }
}
