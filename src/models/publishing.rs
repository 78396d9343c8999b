//! Cross-platform publishing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::query::FilterField;
use crate::resource::{Resource, WriteContext};
use crate::store::StatsSpec;
use crate::validation::Checks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPlatform {
    Facebook,
    Twitter,
    Instagram,
    Linkedin,
    Tiktok,
    Youtube,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
    Failed,
}

/// A post published to several social platforms at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    /// Post text.
    pub content: String,
    /// Target platforms, sorted and deduplicated. At least one.
    pub platforms: Vec<SocialPlatform>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// Required when `status` is `scheduled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: PostStatus,
}

impl Resource for SocialPost {
    const COLLECTION: &'static str = "social_posts";
    const SINGULAR: &'static str = "post";
    const PLURAL: &'static str = "posts";
    const FILTERS: &'static [FilterField] = &[
        FilterField::one_of("status", &["draft", "scheduled", "published", "failed"]),
        FilterField::date("scheduledFor"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec::count_by("status"));

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.platforms.sort();
        self.platforms.dedup();
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("content", &self.content)
            .max_len("content", &self.content, 5000)
            .check(!self.platforms.is_empty(), "platforms must not be empty")
            .http_urls("mediaUrls", &self.media_urls)
            .check(
                self.status != PostStatus::Scheduled || self.scheduled_for.is_some(),
                "scheduledFor is required when status is scheduled",
            )
            .finish()
    }
}
