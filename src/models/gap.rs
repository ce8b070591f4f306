//! Gap analysis records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed classification of research gaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapCategory {
    Methodological,
    Conceptual,
    Evidence,
    PracticalKnowledge,
    Empirical,
    Theoretical,
    PopulationGap,
}

impl GapCategory {
    pub const ALL: [GapCategory; 7] = [
        GapCategory::Methodological,
        GapCategory::Conceptual,
        GapCategory::Evidence,
        GapCategory::PracticalKnowledge,
        GapCategory::Empirical,
        GapCategory::Theoretical,
        GapCategory::PopulationGap,
    ];

    /// Key used in the model's JSON output
    pub fn key(&self) -> &'static str {
        match self {
            GapCategory::Methodological => "methodological",
            GapCategory::Conceptual => "conceptual",
            GapCategory::Evidence => "evidence",
            GapCategory::PracticalKnowledge => "practical_knowledge",
            GapCategory::Empirical => "empirical",
            GapCategory::Theoretical => "theoretical",
            GapCategory::PopulationGap => "population_gap",
        }
    }

    /// Display name used in prompts
    pub fn label(&self) -> &'static str {
        match self {
            GapCategory::Methodological => "Methodological",
            GapCategory::Conceptual => "Conceptual",
            GapCategory::Evidence => "Evidence",
            GapCategory::PracticalKnowledge => "Practical Knowledge",
            GapCategory::Empirical => "Empirical",
            GapCategory::Theoretical => "Theoretical",
            GapCategory::PopulationGap => "Population Gap",
        }
    }

    /// Lenient lookup for keys the model may spell differently
    /// (`Population`, `practical knowledge`, `Practical-Knowledge`, ...)
    pub fn from_key(key: &str) -> Option<GapCategory> {
        let normalized: String = key
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        let normalized = normalized.strip_suffix("_gaps").unwrap_or(&normalized);

        match normalized {
            "methodological" => Some(GapCategory::Methodological),
            "conceptual" => Some(GapCategory::Conceptual),
            "evidence" => Some(GapCategory::Evidence),
            "practical_knowledge" | "practical" => Some(GapCategory::PracticalKnowledge),
            "empirical" => Some(GapCategory::Empirical),
            "theoretical" => Some(GapCategory::Theoretical),
            "population_gap" | "population" => Some(GapCategory::PopulationGap),
            _ => None,
        }
    }
}

/// Per-article gap findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRecord {
    pub article_title: String,

    #[serde(default)]
    pub unique_gaps: Vec<String>,

    #[serde(default)]
    pub recommendations: Vec<String>,

    /// Findings per category; every category is present
    pub gap_categories: BTreeMap<GapCategory, Vec<String>>,
}

impl GapRecord {
    pub fn new(article_title: impl Into<String>) -> Self {
        Self {
            article_title: article_title.into(),
            unique_gaps: Vec::new(),
            recommendations: Vec::new(),
            gap_categories: GapCategory::ALL
                .into_iter()
                .map(|category| (category, Vec::new()))
                .collect(),
        }
    }

    pub fn category(&self, category: GapCategory) -> &[String] {
        self.gap_categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Cross-article comparison, one per run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    #[serde(default)]
    pub commonalities: Vec<String>,

    #[serde(default)]
    pub contrasts: Vec<String>,

    #[serde(default)]
    pub emerging_trends: Vec<String>,
}

/// Validated output of one gap analysis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapAnalysis {
    pub records: Vec<GapRecord>,
    pub comparison: ComparisonRecord,
}
