// src/services/normalizer.rs

//! Record normalizer.
//!
//! The only place that knows the positional upstream layout. Records are
//! length-checked before any field is read, so field-count drift upstream
//! drops records instead of misreading them.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    Category, CourseCatalog, ID_PREFIX, Location, NormalizedInstitution, Ownership, RawRecord,
    scalar_text,
};

/// Keyword pattern for a subject category. `General` is the fallback and has
/// none.
fn keyword_pattern(category: Category) -> Option<&'static str> {
    let pattern = match category {
        Category::Engineering => {
            r"\b(engineering|engg|technolog\w*|polytechnic|technical|iit|nit)\b"
        }
        Category::Medical => {
            r"\b(medical|medicine|mbbs|nursing|pharma\w*|dental|ayurved\w*|homo?eopath\w*|health|hospital)\b"
        }
        Category::Law => r"\b(law|legal|llb)\b",
        Category::Education => r"\b(education|b\.\s?ed|teachers?|training)\b",
        Category::Commerce => r"\b(commerce|management|business|mba|bba|accountanc\w*)\b",
        Category::Science => r"\b(science|sciences|b\.\s?sc)\b",
        Category::Arts => r"\b(arts|humanities|fine art|music|literature)\b",
        Category::General => return None,
    };
    Some(pattern)
}

/// Maps raw upstream records to [`NormalizedInstitution`]s.
///
/// Holds only immutable data, so normalization is a pure function of its input.
#[derive(Debug, Clone)]
pub struct Normalizer {
    catalog: Arc<CourseCatalog>,
    categories: Vec<(Category, Regex)>,
}

impl Normalizer {
    /// Compile keyword patterns and attach the course catalog.
    pub fn new(catalog: Arc<CourseCatalog>) -> Result<Self> {
        let categories = Category::PRIORITY
            .into_iter()
            .filter_map(|category| keyword_pattern(category).map(|p| (category, p)))
            .map(|(category, pattern)| Ok((category, compile(pattern)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { catalog, categories })
    }

    /// Normalize a page entry. `None` for nulls and malformed records.
    pub fn normalize(&self, value: &Value) -> Option<NormalizedInstitution> {
        RawRecord::from_value(value).map(|record| self.normalize_record(&record))
    }

    /// Normalize a record already known to be well-formed.
    pub fn normalize_record(&self, record: &RawRecord<'_>) -> NormalizedInstitution {
        let name = record.name();
        let category_text = record.category();
        let text = format!("{name} {category_text}");

        let category = self.infer_category(&text);
        let ownership = self.infer_ownership(&text);
        let courses = self.catalog.courses_for(category).to_vec();

        NormalizedInstitution {
            id: format!("{ID_PREFIX}{}", record.id()),
            name,
            ownership,
            category,
            university: record.university(),
            location: Location::new(record.state(), record.district()),
            total_courses: courses.len(),
            courses,
            source: "external".to_string(),
        }
    }

    /// First category in priority order whose keywords appear in `text`.
    pub fn infer_category(&self, text: &str) -> Category {
        self.categories
            .iter()
            .find(|(_, pattern)| pattern.is_match(text))
            .map(|(category, _)| *category)
            .unwrap_or(Category::General)
    }

    /// Plain substring match: `government`/`govt` first, then `aided`.
    pub fn infer_ownership(&self, text: &str) -> Ownership {
        let text = text.to_lowercase();
        if text.contains("government") || text.contains("govt") {
            Ownership::Government
        } else if text.contains("aided") {
            Ownership::Aided
        } else {
            Ownership::Private
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("(?i){pattern}"))
        .map_err(|e| AppError::config(format!("invalid keyword pattern {pattern}: {e}")))
}

/// Extract names from a reference-list response (states or districts).
///
/// Entries may be plain strings or arrays whose first string is the name.
/// Nulls and blanks are skipped, duplicates dropped, order preserved.
pub fn reference_names(page: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    page.iter()
        .filter_map(|entry| match entry {
            Value::Array(fields) => fields
                .iter()
                .find(|field| field.is_string())
                .map(scalar_text),
            other => Some(scalar_text(other)),
        })
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
