//! Data models for greenharvest.

mod article;

pub use article::{
    ArticleRecord, CSV_HEADERS, SOURCE_NAME, SUB_CATEGORY, TECHNOLOGY_CATEGORY,
};
