use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub String);

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CourseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Sort keys understood by the course listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    #[serde(rename = "rating")]
    Rating,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "ratingCount")]
    RatingCount,
}

impl SortField {
    pub const ALL: [SortField; 3] = [SortField::Rating, SortField::Title, SortField::RatingCount];

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Rating => "rating",
            SortField::Title => "title",
            SortField::RatingCount => "ratingCount",
        }
    }

    /// Case-insensitive lookup of a wire identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "beginner" | "iniciante" => Some(CourseLevel::Beginner),
            "intermediate" | "intermediário" | "intermediario" => Some(CourseLevel::Intermediate),
            "advanced" | "avançado" | "avancado" => Some(CourseLevel::Advanced),
            _ => None,
        }
    }

    /// Backend level labels are free text in either English or Portuguese.
    pub fn matches_label(self, label: &str) -> bool {
        let label = label.to_lowercase();
        let needles: &[&str] = match self {
            CourseLevel::Beginner => &["beginner", "iniciante"],
            CourseLevel::Intermediate => &["intermediate", "intermediário", "intermediario"],
            CourseLevel::Advanced => &["advanced", "avançado", "avancado"],
        };
        needles.iter().any(|needle| label.contains(needle))
    }
}
