//! Workspace analytics snapshots: countries, traffic channels, devices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::query::FilterField;
use crate::resource::{Resource, WriteContext};
use crate::store::StatsSpec;
use crate::validation::Checks;

pub(crate) const DEVICES: &[&str] = &["desktop", "mobile", "tablet", "other"];

/// Traffic and revenue for one country.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    /// Display name.
    pub name: String,
    /// ISO 3166 alpha-2, upper case.
    pub code: String,
    /// Unique visitors.
    #[serde(default)]
    pub visitors: u64,
    /// Sessions started.
    #[serde(default)]
    pub sessions: u64,
    /// Revenue attributed to the country.
    #[serde(default)]
    pub revenue: f64,
    /// Percentage from 0 to 100.
    #[serde(default)]
    pub conversion_rate: f64,
    /// Day the figures belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl Resource for Country {
    const COLLECTION: &'static str = "countries";
    const SINGULAR: &'static str = "country";
    const PLURAL: &'static str = "countries";
    const FILTERS: &'static [FilterField] = &[
        FilterField::text("code"),
        FilterField::text("name"),
        FilterField::number("visitors"),
        FilterField::number("revenue"),
        FilterField::date("date"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "code",
        sum: &["visitors", "sessions", "revenue"],
        avg: &["conversionRate"],
    });

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.name = self.name.trim().to_string();
        self.code = self.code.trim().to_uppercase();
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("name", &self.name)
            .country_code("code", Some(self.code.as_str()))
            .non_negative("revenue", self.revenue)
            .range("conversionRate", self.conversion_rate, 0.0, 100.0)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Direct,
    Organic,
    Paid,
    Social,
    Referral,
    Email,
    Other,
}

/// Traffic and revenue for one acquisition channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficChannel {
    /// Acquisition channel.
    pub channel: Channel,
    /// Unique visitors.
    #[serde(default)]
    pub visitors: u64,
    /// Sessions started.
    #[serde(default)]
    pub sessions: u64,
    /// Percentage from 0 to 100.
    #[serde(default)]
    pub bounce_rate: f64,
    /// Completed conversions.
    #[serde(default)]
    pub conversions: u64,
    /// Revenue attributed to the channel.
    #[serde(default)]
    pub revenue: f64,
    /// Day the figures belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl Resource for TrafficChannel {
    const COLLECTION: &'static str = "traffic_channels";
    const SINGULAR: &'static str = "trafficChannel";
    const PLURAL: &'static str = "trafficChannels";
    const FILTERS: &'static [FilterField] = &[
        FilterField::one_of(
            "channel",
            &["direct", "organic", "paid", "social", "referral", "email", "other"],
        ),
        FilterField::number("visitors"),
        FilterField::number("conversions"),
        FilterField::date("date"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "channel",
        sum: &["visitors", "conversions", "revenue"],
        avg: &["bounceRate"],
    });

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .range("bounceRate", self.bounce_rate, 0.0, 100.0)
            .non_negative("revenue", self.revenue)
            .check(
                self.conversions <= self.sessions || self.sessions == 0,
                "conversions cannot exceed sessions",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Desktop,
    Mobile,
    Tablet,
    Other,
}

/// Engagement for one device, OS and browser combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAnalytics {
    /// Device class.
    pub device: Device,
    /// Operating system name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Browser name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default)]
    pub sessions: u64,
    #[serde(default)]
    pub users: u64,
    /// Percentage from 0 to 100.
    #[serde(default)]
    pub bounce_rate: f64,
    /// Seconds.
    #[serde(default)]
    pub avg_session_duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl Resource for DeviceAnalytics {
    const COLLECTION: &'static str = "device_analytics";
    const SINGULAR: &'static str = "deviceAnalytics";
    const PLURAL: &'static str = "deviceAnalytics";
    const FILTERS: &'static [FilterField] = &[
        FilterField::one_of("device", DEVICES),
        FilterField::text("os"),
        FilterField::text("browser"),
        FilterField::number("sessions"),
        FilterField::date("date"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "device",
        sum: &["sessions", "users"],
        avg: &["bounceRate", "avgSessionDuration"],
    });

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .range("bounceRate", self.bounce_rate, 0.0, 100.0)
            .non_negative("avgSessionDuration", self.avg_session_duration)
            .check(
                self.users <= self.sessions || self.sessions == 0,
                "users cannot exceed sessions",
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_code_is_upper_cased_and_checked() {
        let mut country: Country =
            serde_json::from_value(serde_json::json!({"name": "Brazil", "code": "br"})).unwrap();
        let cipher = crate::crypto::FieldCipher::from_base64_key(&crate::crypto::generate_key())
            .unwrap();
        let ctx = WriteContext {
            cipher: &cipher,
            phone_region: phonenumber::country::Id::US,
        };
        country.normalize(&ctx).unwrap();
        assert_eq!(country.code, "BR");
        assert!(country.validate().is_ok());

        country.code = "BRA".into();
        assert!(country.validate().is_err());
    }

    #[test]
    fn test_negative_counts_fail_to_parse() {
        let parsed = serde_json::from_value::<TrafficChannel>(
            serde_json::json!({"channel": "paid", "visitors": -3}),
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_bounce_rate_bounds() {
        let device: DeviceAnalytics = serde_json::from_value(
            serde_json::json!({"device": "mobile", "bounceRate": 140.0}),
        )
        .unwrap();
        assert!(device.validate().is_err());
    }
}
