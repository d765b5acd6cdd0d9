//! Best-effort activation of named page sections.
//!
//! Section content on the article page can sit behind tab or accordion
//! toggles. `reveal` brings one section into a readable state and never
//! errors: a missing control, a failed click, or a timeout all leave the
//! page as it was.

use std::time::Duration;

use tracing::debug;

use crate::scrapers::ArticleSession;

/// Sections whose content may sit behind a toggle control.
pub const KNOWN_SECTIONS: &[&str] = &["Description", "Benefits", "Additional Information"];

const CLICK_TIMEOUT: Duration = Duration::from_secs(3);
const SETTLE_DELAY: Duration = Duration::from_millis(300);

pub struct PanelActivator<'a> {
    session: &'a ArticleSession,
}

impl<'a> PanelActivator<'a> {
    pub fn new(session: &'a ArticleSession) -> Self {
        Self { session }
    }

    /// Reveal every known section once, in page order.
    pub async fn reveal_all(&self) {
        for section in KNOWN_SECTIONS {
            self.reveal(section).await;
        }
    }

    /// Bring one section into a readable state. Idempotent: a control that
    /// is already expanded or selected is left alone.
    pub async fn reveal(&self, section: &str) -> bool {
        let script = activation_script(section);
        let outcome: Option<String> = self
            .session
            .evaluate_with_timeout(&script, CLICK_TIMEOUT)
            .await;
        match outcome.as_deref() {
            Some("clicked") => {
                debug!("Activated section {:?}", section);
                tokio::time::sleep(SETTLE_DELAY).await;
                true
            }
            Some("active") => true,
            other => {
                debug!("No activatable control for {:?} ({:?})", section, other);
                false
            }
        }
    }
}

/// Click script for one section label: exact-text match on buttons first,
/// then links.
fn activation_script(section: &str) -> String {
    // serde_json string-escapes the label for embedding in the script
    let label = serde_json::to_string(&section.trim().to_lowercase())
        .unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(() => {{
            const label = {label};
            const isActive = (el) =>
                el.getAttribute('aria-expanded') === 'true' ||
                el.getAttribute('aria-selected') === 'true';
            const matches = (el) => (el.textContent || '').trim().toLowerCase() === label;
            const controls = [
                ...document.querySelectorAll('button, [role="button"], [role="tab"]'),
                ...document.querySelectorAll('a'),
            ];
            for (const el of controls) {{
                if (!matches(el)) continue;
                if (isActive(el)) return 'active';
                el.click();
                return 'clicked';
            }}
            return 'missing';
        }})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_script_embeds_lowercased_label() {
        let script = activation_script("Additional Information");
        assert!(script.contains("\"additional information\""));
    }

    #[test]
    fn test_activation_script_escapes_quotes_in_label() {
        let script = activation_script("A \"quoted\" label");
        assert!(script.contains(r#""a \"quoted\" label""#));
    }

    #[test]
    fn test_activation_script_requires_exact_match() {
        // The matcher compares full trimmed text, so "Benefits" can never
        // activate a "Benefits Description" control.
        let script = activation_script("Benefits");
        assert!(script.contains("=== label"));
    }
}
