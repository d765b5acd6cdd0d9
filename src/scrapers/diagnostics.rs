//! Bounded DOM snapshots for offline debugging of the benefits fields.
//!
//! Triggered only when Benefits is still empty after every stage. Failure
//! here is swallowed entirely; diagnostics must never affect the primary
//! output.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::scrapers::ArticleSession;

/// Upper bound on captured label nodes.
const SNAPSHOT_LIMIT: usize = 20;
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Collects every element reading exactly "benefits" or "benefits
/// description", with truncated text and markup for it and its parent.
const SNAPSHOT_SCRIPT: &str = r#"
    (() => {
        const info = (el) => ({
            tag: el.tagName,
            text: ((el.textContent || '').trim()).slice(0, 200),
            html: el.outerHTML.slice(0, 400),
        });
        const hits = [];
        for (const el of document.querySelectorAll('*')) {
            const t = (el.textContent || '').trim();
            if (/^benefits( description)?$/i.test(t)) {
                hits.push({
                    label: t,
                    node: info(el),
                    parent: el.parentElement ? info(el.parentElement) : null,
                });
                if (hits.length >= 20) break;
            }
        }
        return hits;
    })()
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub tag: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelHit {
    pub label: String,
    pub node: NodeInfo,
    pub parent: Option<NodeInfo>,
}

#[derive(Debug, Serialize)]
pub struct DebugSnapshot {
    pub captured_at: DateTime<Utc>,
    pub hits: Vec<LabelHit>,
}

fn bounded(mut hits: Vec<LabelHit>) -> Vec<LabelHit> {
    hits.truncate(SNAPSHOT_LIMIT);
    hits
}

/// Capture the snapshot and write it next to the output files. Returns the
/// path on success; every failure is a `None`.
pub async fn dump_benefits_nodes(
    session: &ArticleSession,
    out_dir: &Path,
    stem: &str,
) -> Option<PathBuf> {
    let hits: Vec<LabelHit> = session
        .evaluate_with_timeout(SNAPSHOT_SCRIPT, SNAPSHOT_TIMEOUT)
        .await?;
    let snapshot = DebugSnapshot {
        captured_at: Utc::now(),
        hits: bounded(hits),
    };
    let payload = serde_json::to_string_pretty(&snapshot).ok()?;

    if let Err(e) = std::fs::create_dir_all(out_dir) {
        warn!("Could not create {:?} for debug snapshot: {}", out_dir, e);
        return None;
    }
    let path = out_dir.join(format!("debug-benefits-{stem}.json"));
    if let Err(e) = std::fs::write(&path, payload) {
        warn!("Could not write debug snapshot: {}", e);
        return None;
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(label: &str) -> LabelHit {
        LabelHit {
            label: label.to_string(),
            node: NodeInfo {
                tag: "SPAN".to_string(),
                text: label.to_string(),
                html: format!("<span>{label}</span>"),
            },
            parent: None,
        }
    }

    #[test]
    fn test_snapshot_is_bounded() {
        let hits: Vec<LabelHit> = (0..50).map(|_| hit("Benefits")).collect();
        assert_eq!(bounded(hits).len(), SNAPSHOT_LIMIT);
    }

    #[test]
    fn test_small_snapshots_pass_through() {
        let hits = vec![hit("Benefits"), hit("Benefits Description")];
        assert_eq!(bounded(hits).len(), 2);
    }
}
