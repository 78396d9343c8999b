//! Leads and notifications.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;
use crate::errors::AppError;
use crate::query::FilterField;
use crate::resource::{Resource, WriteContext};
use crate::store::StatsSpec;
use crate::validation::{normalize_phone, Checks};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    #[default]
    Website,
    Referral,
    Social,
    Email,
    Ads,
    Other,
}

/// Sales pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

/// A sales lead captured by a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Contact name.
    pub name: String,
    /// Contact email, lower-cased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// E.164 after normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Company the lead works for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Channel the lead came in through.
    #[serde(default)]
    pub source: LeadSource,
    /// Position in the sales pipeline.
    #[serde(default)]
    pub status: LeadStatus,
    /// Qualification score from 0 to 100.
    #[serde(default)]
    pub score: f64,
    /// Expected deal value.
    #[serde(default)]
    pub value: f64,
    /// Workspace member who owns the lead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Lower-cased labels, first occurrence kept.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Resource for Lead {
    const COLLECTION: &'static str = "leads";
    const SINGULAR: &'static str = "lead";
    const PLURAL: &'static str = "leads";
    const FILTERS: &'static [FilterField] = &[
        FilterField::one_of(
            "status",
            &["new", "contacted", "qualified", "converted", "lost"],
        ),
        FilterField::one_of(
            "source",
            &["website", "referral", "social", "email", "ads", "other"],
        ),
        FilterField::id("assignedTo"),
        FilterField::number("score"),
        FilterField::number("value"),
        FilterField::text("email"),
        FilterField::text("company"),
        FilterField::text("name"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "status",
        sum: &["value"],
        avg: &["score"],
    });

    fn normalize(&mut self, ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.name = self.name.trim().to_string();
        self.email = self
            .email
            .take()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        self.tags = self
            .tags
            .drain(..)
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let mut seen = HashSet::new();
        self.tags.retain(|t| seen.insert(t.clone()));

        if let Some(raw) = self.phone.take().filter(|p| !p.trim().is_empty()) {
            let phone = normalize_phone(&raw, ctx.phone_region)
                .map_err(|e| AppError::BadRequest(format!("Invalid input data. phone: {}", e)))?;
            self.phone = Some(phone);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("name", &self.name)
            .max_len("name", &self.name, 200)
            .email("email", self.email.as_deref())
            .range("score", self.score, 0.0, 100.0)
            .non_negative("value", self.value)
            .check(self.tags.len() <= 50, "tags must have at most 50 entries")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    #[default]
    InApp,
    Email,
    Sms,
    Push,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A message addressed to one workspace member.
///
/// Staff create and manage notifications; recipients read and mark
/// their own through the `/notifications/me` routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// User the notification is addressed to.
    pub recipient: Uuid,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Severity shown to the user (`type` on the wire).
    #[serde(default, rename = "type")]
    pub kind: NotificationType,
    /// Delivery channel.
    #[serde(default)]
    pub channel: NotificationChannel,
    /// Delivery priority.
    #[serde(default)]
    pub priority: Priority,
    /// Whether the recipient has seen it.
    #[serde(default)]
    pub read: bool,
    /// When it was first marked read. Cleared while `read` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    /// Where the notification points in the app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Notification {
    /// Marks the notification read, stamping `read_at` only the first time.
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        if !self.read {
            self.read = true;
            self.read_at = Some(at);
        }
    }
}

impl Resource for Notification {
    const COLLECTION: &'static str = "notifications";
    const SINGULAR: &'static str = "notification";
    const PLURAL: &'static str = "notifications";
    // Recipients read their own through /notifications/me.
    const READ_ROLES: &'static [Role] = Role::STAFF;
    const FILTERS: &'static [FilterField] = &[
        FilterField::id("recipient"),
        FilterField::one_of("type", &["info", "success", "warning", "error"]),
        FilterField::one_of("channel", &["in_app", "email", "sms", "push"]),
        FilterField::one_of("priority", &["low", "normal", "high", "urgent"]),
        FilterField::boolean("read"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec::count_by("type"));

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        if !self.read {
            self.read_at = None;
        } else if self.read_at.is_none() {
            self.read_at = Some(Utc::now());
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("title", &self.title)
            .max_len("title", &self.title, 200)
            .required("message", &self.message)
            .max_len("message", &self.message, 2000)
            .check(
                self.link
                    .as_deref()
                    .map_or(true, |l| l.starts_with('/') || crate::validation::is_http_url(l)),
                "link must be a relative path or an http(s) URL",
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_key, FieldCipher};
    use crate::resource::build;
    use phonenumber::country::Id as CountryId;
    use serde_json::{json, Map, Value};

    fn fields(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn with_ctx<T>(f: impl FnOnce(&WriteContext<'_>) -> T) -> T {
        let cipher = FieldCipher::from_base64_key(&generate_key()).unwrap();
        f(&WriteContext {
            cipher: &cipher,
            phone_region: CountryId::US,
        })
    }

    #[test]
    fn test_lead_defaults_and_normalization() {
        let lead: Lead = with_ctx(|ctx| {
            build(
                fields(json!({
                    "name": "  Ana Souza ",
                    "email": "Ana@Example.com",
                    "phone": "(650) 253-0000",
                    "tags": ["VIP", "vip", " "],
                })),
                ctx,
            )
        })
        .unwrap();

        assert_eq!(lead.name, "Ana Souza");
        assert_eq!(lead.email.as_deref(), Some("ana@example.com"));
        assert_eq!(lead.phone.as_deref(), Some("+16502530000"));
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.source, LeadSource::Website);
        assert_eq!(lead.tags, vec!["vip".to_string()]);
    }

    #[test]
    fn test_lead_tags_dedup_keeps_first_occurrence() {
        let lead: Lead = with_ctx(|ctx| {
            build(
                fields(json!({"name": "Bia", "tags": ["vip", "b", "VIP", " b "]})),
                ctx,
            )
        })
        .unwrap();

        assert_eq!(lead.tags, vec!["vip".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_lead_rejects_bad_input() {
        let missing_name = with_ctx(|ctx| build::<Lead>(fields(json!({"email": "a@b.co"})), ctx));
        assert!(matches!(missing_name, Err(AppError::BadRequest(_))));

        let bad_status =
            with_ctx(|ctx| build::<Lead>(fields(json!({"name": "A", "status": "won"})), ctx));
        assert!(matches!(bad_status, Err(AppError::BadRequest(_))));

        let bad_score =
            with_ctx(|ctx| build::<Lead>(fields(json!({"name": "A", "score": 101})), ctx));
        assert!(matches!(bad_score, Err(AppError::BadRequest(_))));

        let bad_phone =
            with_ctx(|ctx| build::<Lead>(fields(json!({"name": "A", "phone": "12"})), ctx));
        assert!(matches!(bad_phone, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_notification_read_at_follows_read_flag() {
        let n: Notification = with_ctx(|ctx| {
            build(
                fields(json!({
                    "recipient": Uuid::new_v4(),
                    "title": "Payout sent",
                    "message": "Your payout is on its way",
                    "type": "success",
                    "read": true,
                })),
                ctx,
            )
        })
        .unwrap();

        assert_eq!(n.kind, NotificationType::Success);
        assert!(n.read_at.is_some());

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "success");
        assert_eq!(json["channel"], "in_app");
    }
}
