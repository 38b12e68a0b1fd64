use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{CourseId, CourseLevel};

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

/// The backend is inconsistent about rating fields: some deployments send
/// `"4.5"`, others `4.5`. Both are kept as text; `null` becomes empty.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TextOrNumber>::deserialize(deserializer)? {
        Some(TextOrNumber::Text(text)) => text,
        Some(TextOrNumber::Number(number)) => number.to_string(),
        None => String::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub course_levels: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub rating_average: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub rating_count: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl CourseSummary {
    pub fn has_level(&self, level: CourseLevel) -> bool {
        self.course_levels
            .iter()
            .any(|label| level.matches_label(label))
    }
}

/// One server-confirmed page of the course listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePage {
    pub total_count: u64,
    pub page_number: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_previous_page: bool,
    pub has_next_page: bool,
    #[serde(default, alias = "items")]
    pub courses: Vec<CourseSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    #[serde(flatten)]
    pub summary: CourseSummary,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub what_youll_learn: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseReview {
    pub rating: i32,
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub update_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarCourse {
    pub id: CourseId,
    pub title: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub rating_average: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub rating_count: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarCoursesResponse {
    #[serde(default)]
    pub similar_courses: Vec<SimilarCourse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(deserialize_with = "text_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

/// Body of `PUT /rating/{courseId}`. A missing review is sent as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingRequest {
    pub rating: u8,
    pub review: Option<String>,
}
