//! The normalized record produced by one article extraction.
//!
//! Every field defaults to the empty string (never null) so downstream
//! serialization is uniform; the record is mutated in place by each
//! pipeline stage and finalized at output time.

use serde::{Deserialize, Serialize};

/// Fixed category constants for this dataset.
pub const TECHNOLOGY_CATEGORY: &str = "清洁能源技术";
pub const SUB_CATEGORY: &str = "风能技术";
pub const SOURCE_NAME: &str = "WIPO Green";

/// CSV column order. Must stay in sync with [`ArticleRecord::csv_fields`].
pub const CSV_HEADERS: &[&str] = &[
    "technologyNameEN",
    "id",
    "companyName",
    "publishedDate",
    "updatedDate",
    "companyWebsiteUrl",
    "technologyImageUrl",
    "description",
    "benefits",
    "benefitsDescription",
    "developedInCountry",
    "deployedInCountry",
    "technologyReadinessLevel",
    "intellectualProperty",
    "customLabels",
    "technologyNameCN",
    "technologyCategory",
    "subCategory",
];

/// One extracted article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleRecord {
    #[serde(rename = "technologyNameEN")]
    pub technology_name_en: String,
    /// Numeric-looking article identifier; when present it is authoritative
    /// for cross-source correlation.
    pub id: String,
    pub company_name: String,
    pub published_date: String,
    pub updated_date: String,
    pub company_website_url: String,
    pub technology_image_url: String,
    pub description: String,
    pub benefits: String,
    /// Newline-joined bullet text, one item per line after normalization.
    pub benefits_description: String,
    pub developed_in_country: String,
    pub deployed_in_country: String,
    pub technology_readiness_level: String,
    pub intellectual_property: String,
    /// At most 2 keyword tags derived from the description.
    pub custom_labels: Vec<String>,
    #[serde(rename = "technologyNameCN")]
    pub technology_name_cn: String,
    pub technology_category: String,
    pub sub_category: String,
    pub source: String,
}

impl ArticleRecord {
    /// Field values in [`CSV_HEADERS`] order. `customLabels` is joined with
    /// a separator distinct from the field delimiter.
    pub fn csv_fields(&self) -> Vec<String> {
        vec![
            self.technology_name_en.clone(),
            self.id.clone(),
            self.company_name.clone(),
            self.published_date.clone(),
            self.updated_date.clone(),
            self.company_website_url.clone(),
            self.technology_image_url.clone(),
            self.description.clone(),
            self.benefits.clone(),
            self.benefits_description.clone(),
            self.developed_in_country.clone(),
            self.deployed_in_country.clone(),
            self.technology_readiness_level.clone(),
            self.intellectual_property.clone(),
            self.custom_labels.join("|"),
            self.technology_name_cn.clone(),
            self.technology_category.clone(),
            self.sub_category.clone(),
        ]
    }
}
