// src/models/institution.rs

//! Raw upstream records and the canonical institution built from them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::CourseOffering;

/// Prefix applied to upstream ids so they never collide with local ids.
pub const ID_PREFIX: &str = "ext_";

/// A positional upstream record: `[id, university, name, category, state, district]`.
///
/// Borrowed from the decoded page and discarded once normalized.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    fields: &'a [Value],
}

impl<'a> RawRecord<'a> {
    /// Minimum number of positional fields in a valid record.
    pub const FIELD_COUNT: usize = 6;

    const ID: usize = 0;
    const UNIVERSITY: usize = 1;
    const NAME: usize = 2;
    const CATEGORY: usize = 3;
    const STATE: usize = 4;
    const DISTRICT: usize = 5;

    /// View a page entry as a record. `None` for nulls, non-arrays, and
    /// arrays shorter than [`Self::FIELD_COUNT`].
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let fields = value.as_array()?;
        if fields.len() < Self::FIELD_COUNT {
            return None;
        }
        Some(Self { fields })
    }

    pub fn id(&self) -> String {
        self.text(Self::ID)
    }

    pub fn university(&self) -> String {
        self.text(Self::UNIVERSITY)
    }

    pub fn name(&self) -> String {
        self.text(Self::NAME)
    }

    pub fn category(&self) -> String {
        self.text(Self::CATEGORY)
    }

    pub fn state(&self) -> String {
        self.text(Self::STATE)
    }

    pub fn district(&self) -> String {
        self.text(Self::DISTRICT)
    }

    fn text(&self, index: usize) -> String {
        self.fields.get(index).map(scalar_text).unwrap_or_default()
    }
}

/// Render a JSON scalar as trimmed text; null and containers become empty.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Subject-area category inferred from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Engineering,
    Medical,
    Law,
    Education,
    Commerce,
    Science,
    Arts,
    General,
}

impl Category {
    /// Inference priority; the first matching category wins.
    pub const PRIORITY: [Category; 7] = [
        Category::Engineering,
        Category::Medical,
        Category::Law,
        Category::Education,
        Category::Commerce,
        Category::Science,
        Category::Arts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Engineering => "engineering",
            Category::Medical => "medical",
            Category::Law => "law",
            Category::Education => "education",
            Category::Commerce => "commerce",
            Category::Science => "science",
            Category::Arts => "arts",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ownership type of an institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    Government,
    Private,
    Aided,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Ownership::Government => "government",
            Ownership::Private => "private",
            Ownership::Aided => "aided",
        })
    }
}

/// Where an institution is located.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub state: String,
    pub district: String,
    /// The directory has no city field; the district stands in for it.
    pub city: String,
    pub address: String,
}

impl Location {
    pub fn new(state: String, district: String) -> Self {
        let address = [district.as_str(), state.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            city: district.clone(),
            state,
            district,
            address,
        }
    }
}

/// Canonical institution served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedInstitution {
    /// Upstream id with [`ID_PREFIX`]
    pub id: String,

    pub name: String,

    /// Ownership type
    #[serde(rename = "type")]
    pub ownership: Ownership,

    pub category: Category,

    /// Affiliating university
    pub university: String,

    pub location: Location,

    /// Representative offerings for the category
    pub courses: Vec<CourseOffering>,

    pub total_courses: usize,

    /// Always `"external"`
    pub source: String,
}
