// src/models/course.rs

//! Category-keyed course templates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::Category;

/// A representative course offered by institutions of a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOffering {
    pub name: String,
    pub code: String,
    /// Subject area the template belongs to
    pub category: Category,
    pub degree_level: String,
    pub duration: String,
    /// Indicative annual fee in INR
    pub indicative_fee: u32,
}

impl CourseOffering {
    fn template(
        name: &str,
        code: &str,
        category: Category,
        degree_level: &str,
        duration: &str,
        indicative_fee: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            category,
            degree_level: degree_level.to_string(),
            duration: duration.to_string(),
            indicative_fee,
        }
    }
}

/// Immutable lookup from category to its course templates.
///
/// Built once at startup and shared by reference; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CourseCatalog {
    templates: HashMap<Category, Vec<CourseOffering>>,
}

impl CourseCatalog {
    /// Build a catalog from explicit templates. A `General` entry is required
    /// as the fallback and is inserted empty when missing.
    pub fn new(mut templates: HashMap<Category, Vec<CourseOffering>>) -> Self {
        templates.entry(Category::General).or_default();
        Self { templates }
    }

    /// Course templates for a category, falling back to `General`.
    pub fn courses_for(&self, category: Category) -> &[CourseOffering] {
        self.templates
            .get(&category)
            .or_else(|| self.templates.get(&Category::General))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Default for CourseCatalog {
    fn default() -> Self {
        use Category::*;

        let t = CourseOffering::template;
        let templates = HashMap::from([
            (
                Engineering,
                vec![
                    t(
                        "B.Tech Computer Science",
                        "BTECH-CSE",
                        Engineering,
                        "Undergraduate",
                        "4 years",
                        150_000,
                    ),
                    t(
                        "B.Tech Mechanical Engineering",
                        "BTECH-ME",
                        Engineering,
                        "Undergraduate",
                        "4 years",
                        140_000,
                    ),
                    t(
                        "B.Tech Electronics & Communication",
                        "BTECH-ECE",
                        Engineering,
                        "Undergraduate",
                        "4 years",
                        140_000,
                    ),
                    t("M.Tech", "MTECH", Engineering, "Postgraduate", "2 years", 120_000),
                ],
            ),
            (
                Medical,
                vec![
                    t("MBBS", "MBBS", Medical, "Undergraduate", "5.5 years", 600_000),
                    t("B.Sc Nursing", "BSC-NUR", Medical, "Undergraduate", "4 years", 90_000),
                    t("B.Pharm", "BPHARM", Medical, "Undergraduate", "4 years", 100_000),
                ],
            ),
            (
                Law,
                vec![
                    t("BA LLB", "BA-LLB", Law, "Undergraduate", "5 years", 120_000),
                    t("LLB", "LLB", Law, "Undergraduate", "3 years", 80_000),
                    t("LLM", "LLM", Law, "Postgraduate", "1 year", 90_000),
                ],
            ),
            (
                Education,
                vec![
                    t("B.Ed", "BED", Education, "Undergraduate", "2 years", 50_000),
                    t("M.Ed", "MED", Education, "Postgraduate", "2 years", 60_000),
                    t("D.El.Ed", "DELED", Education, "Diploma", "2 years", 30_000),
                ],
            ),
            (
                Commerce,
                vec![
                    t("B.Com", "BCOM", Commerce, "Undergraduate", "3 years", 40_000),
                    t("BBA", "BBA", Commerce, "Undergraduate", "3 years", 80_000),
                    t("MBA", "MBA", Commerce, "Postgraduate", "2 years", 200_000),
                ],
            ),
            (
                Science,
                vec![
                    t("B.Sc Physics", "BSC-PHY", Science, "Undergraduate", "3 years", 35_000),
                    t("B.Sc Chemistry", "BSC-CHEM", Science, "Undergraduate", "3 years", 35_000),
                    t(
                        "B.Sc Computer Science",
                        "BSC-CS",
                        Science,
                        "Undergraduate",
                        "3 years",
                        45_000,
                    ),
                    t("M.Sc", "MSC", Science, "Postgraduate", "2 years", 50_000),
                ],
            ),
            (
                Arts,
                vec![
                    t("BA English", "BA-ENG", Arts, "Undergraduate", "3 years", 25_000),
                    t("BA Economics", "BA-ECO", Arts, "Undergraduate", "3 years", 25_000),
                    t("MA", "MA", Arts, "Postgraduate", "2 years", 30_000),
                ],
            ),
            (
                General,
                vec![
                    t("Bachelor of Arts", "BA", General, "Undergraduate", "3 years", 25_000),
                    t("Bachelor of Science", "BSC", General, "Undergraduate", "3 years", 35_000),
                    t("Bachelor of Commerce", "BCOM", General, "Undergraduate", "3 years", 40_000),
                ],
            ),
        ]);

        Self::new(templates)
    }
}
