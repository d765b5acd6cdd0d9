//! Best-effort EN→CN translation of the technology name.
//!
//! An ordered chain: LibreTranslate, then MyMemory, then a local domain
//! dictionary. Each remote call is bounded by a timeout and any failure
//! (connection, non-OK status, malformed body) is "no result" for that
//! strategy, never an abort. When every strategy comes up empty the
//! original name is kept unchanged.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_libretranslate_endpoint() -> String {
    "https://libretranslate.com/translate".to_string()
}

fn default_mymemory_endpoint() -> String {
    "https://api.mymemory.translated.net/get".to_string()
}

fn default_mymemory_contact() -> String {
    "user@example.com".to_string()
}

fn default_request_timeout() -> u64 {
    12
}

/// Translation chain configuration, read from the environment. Absence of
/// configuration is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default = "default_libretranslate_endpoint")]
    pub libretranslate_endpoint: String,
    #[serde(default)]
    pub libretranslate_api_key: Option<String>,
    #[serde(default = "default_mymemory_endpoint")]
    pub mymemory_endpoint: String,
    /// Contact address MyMemory asks for to lift its anonymous rate limit.
    #[serde(default = "default_mymemory_contact")]
    pub mymemory_contact: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            libretranslate_endpoint: default_libretranslate_endpoint(),
            libretranslate_api_key: None,
            mymemory_endpoint: default_mymemory_endpoint(),
            mymemory_contact: default_mymemory_contact(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl TranslatorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            libretranslate_endpoint: std::env::var("LT_ENDPOINT")
                .unwrap_or(defaults.libretranslate_endpoint),
            libretranslate_api_key: std::env::var("LT_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            mymemory_endpoint: std::env::var("MYMEMORY_ENDPOINT")
                .unwrap_or(defaults.mymemory_endpoint),
            mymemory_contact: std::env::var("MYMEMORY_CONTACT")
                .unwrap_or(defaults.mymemory_contact),
            request_timeout: defaults.request_timeout,
        }
    }
}

#[derive(Serialize)]
struct LibreTranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize, Default)]
struct LibreTranslateResponse {
    #[serde(default, rename = "translatedText")]
    translated_text: String,
}

#[derive(Deserialize, Default)]
struct MyMemoryResponse {
    #[serde(default, rename = "responseData")]
    response_data: MyMemoryData,
}

#[derive(Deserialize, Default)]
struct MyMemoryData {
    #[serde(default, rename = "translatedText")]
    translated_text: String,
}

pub struct NameTranslator {
    config: TranslatorConfig,
    client: reqwest::Client,
    phrase_rules: Vec<(Regex, &'static str)>,
    word_rules: Vec<(Regex, &'static str)>,
}

impl NameTranslator {
    pub fn new(config: TranslatorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .expect("Failed to create HTTP client");

        let rule = |pattern: &str, replacement: &'static str| {
            (Regex::new(pattern).unwrap(), replacement)
        };

        // Phrase-level mappings run before the word dictionary.
        let phrase_rules = vec![rule(r"(?i)\bwind\s+sensor\b", "风速传感器")];
        let word_rules = vec![
            // "fexibile" is a typo that appears verbatim in source articles
            rule(r"(?i)\bfexibile\b", "柔性"),
            rule(r"(?i)\bflexible\b", "柔性"),
            rule(r"(?i)\bfoundations?\b", "基础"),
            rule(r"(?i)\bearthquake[-\s]?proof\b", "抗震"),
            rule(r"(?i)\boffshore\b", "海上"),
            rule(r"(?i)\bwind power\b", "风电"),
            rule(r"(?i)\bwind energy\b", "风能"),
            rule(r"(?i)\bwind\b", "风"),
            rule(r"(?i)\bsensors?\b", "传感器"),
            rule(r"(?i)\bturbines?\b", "风机"),
        ];

        Self {
            config,
            client,
            phrase_rules,
            word_rules,
        }
    }

    /// Run the chain; the first non-empty, non-identical result wins.
    pub async fn translate(&self, name: &str) -> String {
        let name = name.trim();
        if name.is_empty() {
            return String::new();
        }
        if let Some(cn) = self.via_libretranslate(name).await {
            debug!("Translated name via LibreTranslate");
            return cn;
        }
        if let Some(cn) = self.via_mymemory(name).await {
            debug!("Translated name via MyMemory");
            return cn;
        }
        if let Some(cn) = self.via_dictionary(name) {
            debug!("Translated name via local dictionary");
            return cn;
        }
        name.to_string()
    }

    async fn via_libretranslate(&self, name: &str) -> Option<String> {
        let request = LibreTranslateRequest {
            q: name,
            source: "en",
            target: "zh",
            format: "text",
            api_key: self.config.libretranslate_api_key.as_deref(),
        };
        let response = match self
            .client
            .post(&self.config.libretranslate_endpoint)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("LibreTranslate request failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("LibreTranslate returned HTTP {}", response.status());
            return None;
        }
        let body: LibreTranslateResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                debug!("LibreTranslate body unreadable: {}", e);
                return None;
            }
        };
        usable(&body.translated_text, name)
    }

    async fn via_mymemory(&self, name: &str) -> Option<String> {
        let url = format!(
            "{}?langpair={}&de={}&q={}",
            self.config.mymemory_endpoint,
            urlencoding::encode("en|zh"),
            urlencoding::encode(&self.config.mymemory_contact),
            urlencoding::encode(name),
        );
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("MyMemory request failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("MyMemory returned HTTP {}", response.status());
            return None;
        }
        let body: MyMemoryResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                debug!("MyMemory body unreadable: {}", e);
                return None;
            }
        };
        usable(&body.response_data.translated_text, name)
    }

    /// Local heuristic: phrase mappings first, then the word dictionary. A
    /// name no rule touches is "no result".
    fn via_dictionary(&self, name: &str) -> Option<String> {
        let mut cn = name.to_string();
        for (pattern, replacement) in self.phrase_rules.iter().chain(self.word_rules.iter()) {
            cn = pattern.replace_all(&cn, *replacement).into_owned();
        }
        (cn != name).then_some(cn)
    }
}

fn usable(candidate: &str, original: &str) -> Option<String> {
    let candidate = candidate.trim();
    (!candidate.is_empty() && candidate != original).then(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_translator() -> NameTranslator {
        // Unroutable endpoints: both remote strategies fail immediately.
        NameTranslator::new(TranslatorConfig {
            libretranslate_endpoint: "http://127.0.0.1:9/translate".to_string(),
            mymemory_endpoint: "http://127.0.0.1:9/get".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_dictionary_translates_domain_terms() {
        let t = offline_translator();
        let cn = t.via_dictionary("Flexible Foundations for Offshore Wind Turbines");
        let cn = cn.unwrap();
        assert!(cn.contains("柔性"));
        assert!(cn.contains("基础"));
        assert!(cn.contains("海上"));
        assert!(cn.contains("风机"));
    }

    #[test]
    fn test_dictionary_prefers_phrase_mappings() {
        let t = offline_translator();
        let cn = t.via_dictionary("Compact Wind Sensor").unwrap();
        assert!(cn.contains("风速传感器"));
        assert!(!cn.contains("风 传感器"));
    }

    #[test]
    fn test_dictionary_returns_none_when_no_rule_applies() {
        let t = offline_translator();
        assert_eq!(t.via_dictionary("Quantum Widget"), None);
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_dictionary() {
        let t = offline_translator();
        let cn = t.translate("Offshore Turbine").await;
        assert!(cn.contains("海上"));
        assert!(cn.contains("风机"));
    }

    #[tokio::test]
    async fn test_untranslatable_name_is_kept_unchanged() {
        let t = offline_translator();
        assert_eq!(t.translate("Quantum Widget").await, "Quantum Widget");
    }

    #[tokio::test]
    async fn test_empty_name_stays_empty() {
        let t = offline_translator();
        assert_eq!(t.translate("   ").await, "");
    }
}
