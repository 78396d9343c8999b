//! Product catalogue analytics: compatibility, activity, drafts, purchases,
//! shares, traffic sources and viewers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analytics::{Device, DEVICES};
use crate::errors::AppError;
use crate::query::FilterField;
use crate::resource::{Derived, Relation, Resource, WriteContext, PRODUCT};
use crate::store::StatsSpec;
use crate::validation::Checks;

fn default_currency() -> String {
    "USD".to_string()
}

fn one() -> u64 {
    1
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityStatus {
    #[default]
    Compatible,
    Partial,
    Incompatible,
}

/// Whether a product works on a given platform/version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compatibility {
    /// Product this record describes.
    pub product_id: Uuid,
    /// Platform name, e.g. `shopify`.
    pub platform: String,
    /// Platform version the status applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Level of support.
    #[serde(default)]
    pub status: CompatibilityStatus,
    /// Known issues or caveats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Resource for Compatibility {
    const COLLECTION: &'static str = "compatibility";
    const SINGULAR: &'static str = "compatibility";
    const PLURAL: &'static str = "compatibilities";
    const FILTERS: &'static [FilterField] = &[
        FilterField::id("productId"),
        FilterField::text("platform"),
        FilterField::one_of("status", &["compatible", "partial", "incompatible"]),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec::count_by("status"));
    const RELATION: Option<Relation> = Some(PRODUCT);

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.platform = self.platform.trim().to_string();
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("platform", &self.platform)
            .max_len("platform", &self.platform, 100)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    View,
    Like,
    Comment,
    Purchase,
    Share,
}

/// An interaction with a product, aggregated by `count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductActivity {
    /// Product the activity happened on.
    pub product_id: Uuid,
    /// What the user did.
    pub action: ActivityAction,
    /// Acting user, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Number of occurrences, at least one.
    #[serde(default = "one")]
    pub count: u64,
    /// Monetary value of the activity.
    #[serde(default)]
    pub value: f64,
    /// Defaults to the write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl Resource for ProductActivity {
    const COLLECTION: &'static str = "product_activities";
    const SINGULAR: &'static str = "activity";
    const PLURAL: &'static str = "activities";
    const FILTERS: &'static [FilterField] = &[
        FilterField::id("productId"),
        FilterField::one_of("action", &["view", "like", "comment", "purchase", "share"]),
        FilterField::id("userId"),
        FilterField::date("occurredAt"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "action",
        sum: &["count", "value"],
        avg: &[],
    });
    const RELATION: Option<Relation> = Some(PRODUCT);

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        if self.occurred_at.is_none() {
            self.occurred_at = Some(Utc::now());
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .check(self.count >= 1, "count must be at least 1")
            .non_negative("value", self.value)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    #[default]
    Draft,
    Review,
    Scheduled,
}

/// A product listing that has not been published yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    /// Listing title.
    pub title: String,
    /// Listing description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Asking price.
    #[serde(default)]
    pub price: f64,
    /// ISO 4217 code, upper case.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Catalog category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Editorial state.
    #[serde(default)]
    pub status: DraftStatus,
    /// Planned publish time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Image URLs in display order.
    #[serde(default)]
    pub images: Vec<String>,
}

impl Resource for ProductDraft {
    const COLLECTION: &'static str = "product_drafts";
    const SINGULAR: &'static str = "draft";
    const PLURAL: &'static str = "drafts";
    const FILTERS: &'static [FilterField] = &[
        FilterField::one_of("status", &["draft", "review", "scheduled"]),
        FilterField::text("category"),
        FilterField::number("price"),
        FilterField::date("scheduledAt"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "status",
        sum: &[],
        avg: &["price"],
    });

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.title = self.title.trim().to_string();
        self.currency = self.currency.trim().to_uppercase();
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("title", &self.title)
            .max_len("title", &self.title, 200)
            .non_negative("price", self.price)
            .currency("currency", &self.currency)
            .http_urls("images", &self.images)
            .check(
                self.status != DraftStatus::Scheduled || self.scheduled_at.is_some(),
                "scheduledAt is required when status is scheduled",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    #[default]
    Completed,
    Refunded,
    Pending,
}

/// One purchase of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPurchaseHistory {
    /// Product that was bought.
    pub product_id: Uuid,
    /// Buyer.
    pub customer_id: Uuid,
    /// Units bought, at least one.
    #[serde(default = "one")]
    pub quantity: u64,
    /// Unit price.
    pub price: f64,
    /// `quantity * price` when not supplied.
    #[serde(default)]
    pub total: f64,
    /// ISO 4217 code, upper case.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Settlement state.
    #[serde(default)]
    pub status: PurchaseStatus,
    /// Defaults to the write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<DateTime<Utc>>,
}

impl Resource for ProductPurchaseHistory {
    const COLLECTION: &'static str = "product_purchases";
    const SINGULAR: &'static str = "purchase";
    const PLURAL: &'static str = "purchases";
    const FILTERS: &'static [FilterField] = &[
        FilterField::id("productId"),
        FilterField::id("customerId"),
        FilterField::one_of("status", &["completed", "refunded", "pending"]),
        FilterField::date("purchasedAt"),
        FilterField::number("total"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "status",
        sum: &["quantity", "total"],
        avg: &[],
    });
    const RELATION: Option<Relation> = Some(PRODUCT);
    const DERIVED: &'static [Derived] = &[Derived {
        field: "total",
        inputs: &["quantity", "price"],
    }];

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.currency = self.currency.trim().to_uppercase();
        if self.total == 0.0 {
            self.total = self.price * self.quantity as f64;
        }
        if self.purchased_at.is_none() {
            self.purchased_at = Some(Utc::now());
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .check(self.quantity >= 1, "quantity must be at least 1")
            .non_negative("price", self.price)
            .non_negative("total", self.total)
            .currency("currency", &self.currency)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharePlatform {
    Facebook,
    Twitter,
    Instagram,
    Linkedin,
    Pinterest,
    Email,
    Whatsapp,
    Other,
}

/// A product shared to an outside platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductShare {
    /// Product that was shared.
    pub product_id: Uuid,
    /// Where it was shared.
    pub platform: SharePlatform,
    /// User who shared it, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Clicks on the shared link.
    #[serde(default)]
    pub clicks: u64,
    /// Purchases through the shared link.
    #[serde(default)]
    pub conversions: u64,
}

impl Resource for ProductShare {
    const COLLECTION: &'static str = "product_shares";
    const SINGULAR: &'static str = "share";
    const PLURAL: &'static str = "shares";
    const FILTERS: &'static [FilterField] = &[
        FilterField::id("productId"),
        FilterField::one_of(
            "platform",
            &[
                "facebook", "twitter", "instagram", "linkedin", "pinterest", "email",
                "whatsapp", "other",
            ],
        ),
        FilterField::id("userId"),
        FilterField::number("clicks"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "platform",
        sum: &["clicks", "conversions"],
        avg: &[],
    });
    const RELATION: Option<Relation> = Some(PRODUCT);

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .check(
                self.conversions <= self.clicks,
                "conversions cannot exceed clicks",
            )
            .finish()
    }
}

/// Where a product's visitors came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTrafficSource {
    /// Product the traffic landed on.
    pub product_id: Uuid,
    /// Referrer, e.g. `google`.
    pub source: String,
    /// Medium, e.g. `cpc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    /// Unique visitors.
    #[serde(default)]
    pub visitors: u64,
    /// Purchases from this source.
    #[serde(default)]
    pub conversions: u64,
    /// Revenue from this source.
    #[serde(default)]
    pub revenue: f64,
    /// Day the figures belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl Resource for ProductTrafficSource {
    const COLLECTION: &'static str = "product_traffic_sources";
    const SINGULAR: &'static str = "trafficSource";
    const PLURAL: &'static str = "trafficSources";
    const FILTERS: &'static [FilterField] = &[
        FilterField::id("productId"),
        FilterField::text("source"),
        FilterField::text("medium"),
        FilterField::number("visitors"),
        FilterField::date("date"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "source",
        sum: &["visitors", "conversions", "revenue"],
        avg: &[],
    });
    const RELATION: Option<Relation> = Some(PRODUCT);

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.source = self.source.trim().to_lowercase();
        self.medium = self
            .medium
            .take()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("source", &self.source)
            .non_negative("revenue", self.revenue)
            .finish()
    }
}

/// One view of a product page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductViewer {
    /// Product that was viewed.
    pub product_id: Uuid,
    /// Viewer, when signed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<Uuid>,
    /// ISO 3166 alpha-2 of the viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Device class.
    #[serde(default)]
    pub device: Device,
    /// Seconds on the product page.
    #[serde(default)]
    pub duration: f64,
    /// Defaults to the write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
}

impl Resource for ProductViewer {
    const COLLECTION: &'static str = "product_viewers";
    const SINGULAR: &'static str = "viewer";
    const PLURAL: &'static str = "viewers";
    const FILTERS: &'static [FilterField] = &[
        FilterField::id("productId"),
        FilterField::id("viewerId"),
        FilterField::text("country"),
        FilterField::one_of("device", DEVICES),
        FilterField::date("viewedAt"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "device",
        sum: &[],
        avg: &["duration"],
    });
    const RELATION: Option<Relation> = Some(PRODUCT);

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.country = self
            .country
            .take()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());
        if self.viewed_at.is_none() {
            self.viewed_at = Some(Utc::now());
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .country_code("country", self.country.as_deref())
            .non_negative("duration", self.duration)
            .finish()
    }
}
