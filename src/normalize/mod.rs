//! Post-processing of the merged record.
//!
//! Strips the site's placeholder image, reflows bullet text into one item
//! per line, derives keyword tags from the description, and attaches the
//! fixed dataset constants plus a best-effort translated name.

mod translate;

pub use translate::{NameTranslator, TranslatorConfig};

use regex::Regex;

use crate::models::{ArticleRecord, SOURCE_NAME, SUB_CATEGORY, TECHNOLOGY_CATEGORY};

/// How much of the description feeds keyword tagging.
const TAG_SCAN_CHARS: usize = 1000;
/// At most this many keyword tags per record.
const TAG_LIMIT: usize = 2;

/// Known theme banner the site serves when an article has no real image.
const PLACEHOLDER_IMAGE_PATTERN: &str = r"(?i)assets/img/theme-green-banner-logo";

/// Split free text into one bullet per line: dash/bullet-prefixed segments
/// first (a head segment before the first marker is kept), then
/// semicolons, then plain lines. Never produces empty lines.
pub fn normalize_bullet_lines(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let marker = Regex::new(r"(?:^|\s)[-–—•]\s+").unwrap();
    if marker.is_match(text) {
        let parts: Vec<&str> = marker
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join("\n");
        }
    }
    text.replace(';', "\n")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fixed EN keyword to CN tag mapping for this dataset, applied in
/// insertion order.
pub struct Vocabulary {
    entries: Vec<(&'static str, &'static str)>,
}

impl Vocabulary {
    pub fn wind_energy() -> Self {
        Self {
            entries: vec![
                ("offshore", "海上"),
                ("onshore", "陆上"),
                ("wind", "风能"),
                ("turbine", "风机"),
                ("blade", "叶片"),
                ("foundation", "基础"),
                ("float", "浮动"),
                ("floating", "浮动"),
                ("subsea", "海底"),
                ("grid", "电网"),
                ("power", "电力"),
                ("energy", "能源"),
                ("generator", "发电机"),
                ("maintenance", "维护"),
                ("control", "控制"),
                ("vibration", "振动"),
                ("fault", "故障"),
                ("inspection", "检测"),
                ("efficiency", "效率"),
                ("storm", "风暴"),
                ("typhoon", "台风"),
                ("earthquake", "地震"),
                ("seismic", "抗震"),
            ],
        }
    }

    /// Distinct tags for keywords present in `text`, in vocabulary order.
    pub fn tags(&self, text: &str, limit: usize) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut out: Vec<String> = Vec::new();
        for (keyword, tag) in &self.entries {
            if out.len() >= limit {
                break;
            }
            if lower.contains(keyword) && !out.iter().any(|t| t == tag) {
                out.push(tag.to_string());
            }
        }
        out
    }
}

pub struct Normalizer {
    vocabulary: Vocabulary,
    translator: NameTranslator,
    placeholder_image: Regex,
}

impl Normalizer {
    pub fn new(translator: NameTranslator) -> Self {
        Self {
            vocabulary: Vocabulary::wind_energy(),
            translator,
            placeholder_image: Regex::new(PLACEHOLDER_IMAGE_PATTERN).unwrap(),
        }
    }

    /// A placeholder image URL normalizes to the empty image field.
    pub fn sanitize_image_url(&self, url: &str) -> String {
        if url.is_empty() || self.placeholder_image.is_match(url) {
            String::new()
        } else {
            url.to_string()
        }
    }

    /// Apply every normalization step to the merged record in place.
    pub async fn apply(&self, record: &mut ArticleRecord) {
        record.technology_image_url = self.sanitize_image_url(&record.technology_image_url);

        if !record.benefits_description.is_empty() {
            record.benefits_description = normalize_bullet_lines(&record.benefits_description);
        }

        let tag_source: String = if record.description.is_empty() {
            record.technology_name_en.clone()
        } else {
            record.description.chars().take(TAG_SCAN_CHARS).collect()
        };
        record.custom_labels = self.vocabulary.tags(&tag_source, TAG_LIMIT);

        record.technology_category = TECHNOLOGY_CATEGORY.to_string();
        record.sub_category = SUB_CATEGORY.to_string();
        record.source = SOURCE_NAME.to_string();

        record.technology_name_cn = self.translator.translate(&record.technology_name_en).await;
    }
}
