//! Workspace platform settings: white-label branding, security policy,
//! data-warehouse connectors and the integration hub.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::auth::Role;
use crate::crypto::{fingerprint, FieldCipher};
use crate::errors::AppError;
use crate::query::FilterField;
use crate::resource::{Resource, WriteContext};
use crate::store::StatsSpec;
use crate::validation::{is_hostname, is_ip_or_cidr, Checks};

fn black() -> String {
    "#000000".to_string()
}

fn white() -> String {
    "#ffffff".to_string()
}

/// Branding served to a custom domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteLabelConfig {
    /// Name shown in place of the platform's.
    pub brand_name: String,
    /// Lower-case hostname; unique across workspaces.
    pub domain: String,
    /// Logo image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Favicon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    /// `#rrggbb`, lower case.
    #[serde(default = "black")]
    pub primary_color: String,
    /// `#rrggbb`, lower case.
    #[serde(default = "white")]
    pub secondary_color: String,
    /// Stylesheet injected after the theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
    /// Contact shown in the footer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_email: Option<String>,
    /// Hides the platform's own branding from the UI.
    #[serde(default)]
    pub hide_platform_branding: bool,
}

impl Resource for WhiteLabelConfig {
    const COLLECTION: &'static str = "white_label_configs";
    const SINGULAR: &'static str = "config";
    const PLURAL: &'static str = "configs";
    const FILTERS: &'static [FilterField] = &[
        FilterField::text("domain"),
        FilterField::text("brandName"),
    ];
    const UNIQUE: &'static [&'static str] = &["domain"];
    const READ_ROLES: &'static [Role] = Role::ADMIN_ONLY;
    const WRITE_ROLES: &'static [Role] = Role::ADMIN_ONLY;

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.brand_name = self.brand_name.trim().to_string();
        self.domain = canonical_domain(&self.domain);
        self.primary_color = self.primary_color.trim().to_lowercase();
        self.secondary_color = self.secondary_color.trim().to_lowercase();
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("brandName", &self.brand_name)
            .max_len("brandName", &self.brand_name, 100)
            .check(is_hostname(&self.domain), "domain must be a valid hostname")
            .http_url("logoUrl", self.logo_url.as_deref())
            .http_url("faviconUrl", self.favicon_url.as_deref())
            .hex_color("primaryColor", &self.primary_color)
            .hex_color("secondaryColor", &self.secondary_color)
            .email("supportEmail", self.support_email.as_deref())
            .check(
                self.custom_css.as_deref().map_or(true, |css| css.len() <= 50_000),
                "customCss must be at most 50000 bytes",
            )
            .finish()
    }
}

/// Lower-cases a host and strips a port or trailing dot.
pub fn canonical_domain(raw: &str) -> String {
    let host = raw.trim().to_lowercase();
    let host = host.split(':').next().unwrap_or_default();
    host.trim_end_matches('.').to_string()
}

fn default_min_length() -> u32 {
    12
}

fn yes() -> bool {
    true
}

/// Password rules for workspace members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPolicy {
    /// Minimum password length.
    #[serde(default = "default_min_length")]
    pub min_length: u32,
    /// At least one upper-case letter.
    #[serde(default = "yes")]
    pub require_uppercase: bool,
    /// At least one digit.
    #[serde(default = "yes")]
    pub require_numbers: bool,
    /// At least one symbol.
    #[serde(default = "yes")]
    pub require_symbols: bool,
    /// 0 means passwords never expire.
    #[serde(default)]
    pub expiry_days: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            require_uppercase: true,
            require_numbers: true,
            require_symbols: true,
            expiry_days: 0,
        }
    }
}

/// A secret as submitted (`Plain`) or as stored (`Sealed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretValue {
    Sealed {
        ciphertext: String,
        fingerprint: String,
    },
    Plain(String),
}

fn default_session_timeout() -> u32 {
    60
}

/// Workspace security settings and sealed secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfiguration {
    /// Label for this configuration.
    pub name: String,
    /// Forces 2FA for every member.
    #[serde(default)]
    pub two_factor_required: bool,
    /// Replaced whole on PATCH.
    #[serde(default)]
    pub password_policy: PasswordPolicy,
    /// Idle minutes before a session ends.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_minutes: u32,
    /// Addresses or CIDR ranges allowed to sign in.
    #[serde(default)]
    pub ip_whitelist: Vec<String>,
    /// Encrypted at rest.
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretValue>,
}

impl SecurityConfiguration {
    /// Decrypts every sealed secret.
    pub fn reveal_secrets(&self, cipher: &FieldCipher) -> Result<BTreeMap<String, String>, AppError> {
        self.secrets
            .iter()
            .map(|(name, secret)| {
                let plain = match secret {
                    SecretValue::Sealed { ciphertext, .. } => cipher.decrypt(ciphertext)?,
                    SecretValue::Plain(_) => {
                        return Err(AppError::InternalError(format!(
                            "Secret '{}' was stored unencrypted",
                            name
                        )))
                    }
                };
                Ok((name.clone(), plain))
            })
            .collect()
    }
}

impl Resource for SecurityConfiguration {
    const COLLECTION: &'static str = "security_configurations";
    const SINGULAR: &'static str = "securityConfiguration";
    const PLURAL: &'static str = "securityConfigurations";
    const FILTERS: &'static [FilterField] = &[
        FilterField::text("name"),
        FilterField::boolean("twoFactorRequired"),
        FilterField::number("sessionTimeoutMinutes"),
    ];
    const READ_ROLES: &'static [Role] = Role::ADMIN_ONLY;
    const WRITE_ROLES: &'static [Role] = Role::ADMIN_ONLY;

    /// Seals plain secrets; re-checks sealed ones against their fingerprint.
    fn normalize(&mut self, ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.name = self.name.trim().to_string();
        self.ip_whitelist = self
            .ip_whitelist
            .drain(..)
            .map(|ip| ip.trim().to_lowercase())
            .collect();

        for (name, secret) in self.secrets.iter_mut() {
            let sealed = match secret {
                SecretValue::Plain(plain) => SecretValue::Sealed {
                    ciphertext: ctx.cipher.encrypt(plain)?,
                    fingerprint: fingerprint(plain),
                },
                SecretValue::Sealed {
                    ciphertext,
                    fingerprint: expected,
                } => {
                    let plain = ctx.cipher.decrypt(ciphertext).map_err(|_| {
                        AppError::BadRequest(format!(
                            "Invalid input data. secret '{}' is not a valid sealed value",
                            name
                        ))
                    })?;
                    if fingerprint(&plain) != *expected {
                        return Err(AppError::BadRequest(format!(
                            "Invalid input data. secret '{}' fingerprint mismatch",
                            name
                        )));
                    }
                    continue;
                }
            };
            *secret = sealed;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        let bad_ips: Vec<&str> = self
            .ip_whitelist
            .iter()
            .filter(|ip| !is_ip_or_cidr(ip))
            .map(String::as_str)
            .collect();

        Checks::new()
            .required("name", &self.name)
            .range(
                "passwordPolicy.minLength",
                f64::from(self.password_policy.min_length),
                8.0,
                128.0,
            )
            .range(
                "passwordPolicy.expiryDays",
                f64::from(self.password_policy.expiry_days),
                0.0,
                365.0,
            )
            .range(
                "sessionTimeoutMinutes",
                f64::from(self.session_timeout_minutes),
                5.0,
                1440.0,
            )
            .check(
                bad_ips.is_empty(),
                format!("ipWhitelist has invalid entries: {}", bad_ips.join(", ")),
            )
            .check(
                self.secrets.keys().all(|k| !k.trim().is_empty()),
                "secret names must not be empty",
            )
            .finish()
    }

    /// Secrets are never echoed; only their fingerprints.
    fn present(&self) -> Result<Value, AppError> {
        let mut out = serde_json::to_value(self)
            .map_err(|e| AppError::InternalError(format!("Serializing security config: {}", e)))?;

        let masked: Map<String, Value> = self
            .secrets
            .iter()
            .map(|(name, secret)| {
                let fp = match secret {
                    SecretValue::Sealed { fingerprint, .. } => fingerprint.clone(),
                    SecretValue::Plain(plain) => fingerprint(plain),
                };
                (name.clone(), json!({ "fingerprint": fp }))
            })
            .collect();
        out["secrets"] = Value::Object(masked);
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseProvider {
    Postgres,
    Bigquery,
    Snowflake,
    Redshift,
    Clickhouse,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFrequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Manual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
    Error,
}

/// Connection details for a `DataWarehouse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseConnection {
    /// Warehouse hostname.
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Database or dataset name.
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// An external warehouse the workspace exports into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataWarehouse {
    /// Label for this connection.
    pub name: String,
    /// Warehouse product.
    pub provider: WarehouseProvider,
    /// Where to connect. Credentials live in a security configuration.
    pub connection: WarehouseConnection,
    /// How often exports run.
    #[serde(default)]
    pub sync_frequency: SyncFrequency,
    /// Result of the last connection attempt.
    #[serde(default)]
    pub status: ConnectionStatus,
    /// When the last export finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Tables included in the export.
    #[serde(default)]
    pub tables: Vec<String>,
}

impl Resource for DataWarehouse {
    const COLLECTION: &'static str = "data_warehouses";
    const SINGULAR: &'static str = "dataWarehouse";
    const PLURAL: &'static str = "dataWarehouses";
    const FILTERS: &'static [FilterField] = &[
        FilterField::one_of(
            "provider",
            &["postgres", "bigquery", "snowflake", "redshift", "clickhouse"],
        ),
        FilterField::one_of("status", &["connected", "disconnected", "error"]),
        FilterField::one_of("syncFrequency", &["hourly", "daily", "weekly", "manual"]),
        FilterField::date("lastSyncAt"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec::count_by("provider"));

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.name = self.name.trim().to_string();
        self.connection.host = self.connection.host.trim().to_lowercase();
        self.tables.sort();
        self.tables.dedup();
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("name", &self.name)
            .required("connection.host", &self.connection.host)
            .required("connection.database", &self.connection.database)
            .check(
                self.connection.port != Some(0),
                "connection.port must be between 1 and 65535",
            )
            .check(
                self.tables.iter().all(|t| !t.trim().is_empty()),
                "tables must not contain empty names",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationCategory {
    Crm,
    Email,
    Payments,
    Analytics,
    Social,
    Storage,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Active,
    #[default]
    Inactive,
    Error,
}

fn default_health_path() -> String {
    "/health".to_string()
}

/// A third-party service connected to the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationHub {
    /// Label for this integration.
    pub name: String,
    /// Vendor name, e.g. `stripe`.
    pub provider: String,
    /// Kind of service.
    pub category: IntegrationCategory,
    /// http(s) root of the service.
    pub base_url: String,
    /// Path probed by the connection test, joined to `base_url`.
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Set by the connection test.
    #[serde(default)]
    pub status: IntegrationStatus,
    /// When the connection test last ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Round trip of the last connection test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_latency_ms: Option<u64>,
    /// Failure reason of the last connection test, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Provider-specific options, stored as given.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl Resource for IntegrationHub {
    const COLLECTION: &'static str = "integrations";
    const SINGULAR: &'static str = "integration";
    const PLURAL: &'static str = "integrations";
    const FILTERS: &'static [FilterField] = &[
        FilterField::text("provider"),
        FilterField::one_of(
            "category",
            &["crm", "email", "payments", "analytics", "social", "storage", "other"],
        ),
        FilterField::one_of("status", &["active", "inactive", "error"]),
        FilterField::date("lastCheckedAt"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec::count_by("category"));

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.name = self.name.trim().to_string();
        self.provider = self.provider.trim().to_lowercase();
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if !self.health_path.starts_with('/') {
            self.health_path = format!("/{}", self.health_path.trim());
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .required("name", &self.name)
            .required("provider", &self.provider)
            .http_url("baseUrl", Some(self.base_url.as_str()))
            .check(
                !self.health_path.contains("://"),
                "healthPath must be a path, not a URL",
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_key;
    use crate::resource::build;
    use phonenumber::country::Id as CountryId;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_canonical_domain() {
        assert_eq!(canonical_domain(" Shop.Example.COM:443 "), "shop.example.com");
        assert_eq!(canonical_domain("shop.example.com."), "shop.example.com");
    }

    #[test]
    fn test_white_label_defaults_and_validation() {
        let cipher = FieldCipher::from_base64_key(&generate_key()).unwrap();
        let ctx = WriteContext {
            cipher: &cipher,
            phone_region: CountryId::US,
        };

        let config: WhiteLabelConfig = build(
            object(json!({"brandName": "Acme", "domain": "Brand.Acme.io"})),
            &ctx,
        )
        .unwrap();
        assert_eq!(config.domain, "brand.acme.io");
        assert_eq!(config.primary_color, "#000000");

        let bad = build::<WhiteLabelConfig>(
            object(json!({"brandName": "Acme", "domain": "acme", "primaryColor": "red"})),
            &ctx,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_security_secrets_are_sealed_and_masked() {
        let cipher = FieldCipher::from_base64_key(&generate_key()).unwrap();
        let ctx = WriteContext {
            cipher: &cipher,
            phone_region: CountryId::US,
        };

        let config: SecurityConfiguration = build(
            object(json!({
                "name": "default",
                "ipWhitelist": ["10.0.0.0/8"],
                "secrets": {"stripe": "sk_live_123"},
            })),
            &ctx,
        )
        .unwrap();

        let stored = serde_json::to_value(&config).unwrap();
        let ciphertext = stored["secrets"]["stripe"]["ciphertext"].as_str().unwrap();
        assert!(FieldCipher::is_encrypted(ciphertext));
        assert!(!stored.to_string().contains("sk_live_123"));

        let presented = config.present().unwrap();
        assert_eq!(
            presented["secrets"]["stripe"],
            json!({"fingerprint": fingerprint("sk_live_123")})
        );

        let revealed = config.reveal_secrets(&cipher).unwrap();
        assert_eq!(revealed["stripe"], "sk_live_123");

        // sealed values survive a second normalization untouched
        let again: SecurityConfiguration = build(object(stored.clone()), &ctx).unwrap();
        assert_eq!(serde_json::to_value(&again).unwrap()["secrets"], stored["secrets"]);
    }

    #[test]
    fn test_security_rejects_forged_sealed_values() {
        let cipher = FieldCipher::from_base64_key(&generate_key()).unwrap();
        let ctx = WriteContext {
            cipher: &cipher,
            phone_region: CountryId::US,
        };

        let result = build::<SecurityConfiguration>(
            object(json!({
                "name": "default",
                "secrets": {"stripe": {"ciphertext": "enc:v1:AAAA", "fingerprint": "0"}},
            })),
            &ctx,
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_security_policy_bounds() {
        let config: SecurityConfiguration = serde_json::from_value(json!({
            "name": "weak",
            "passwordPolicy": {"minLength": 4},
            "sessionTimeoutMinutes": 2,
            "ipWhitelist": ["office"],
        }))
        .unwrap();

        match config.validate() {
            Err(AppError::BadRequest(msg)) => {
                assert!(msg.contains("passwordPolicy.minLength"));
                assert!(msg.contains("sessionTimeoutMinutes"));
                assert!(msg.contains("office"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_integration_normalization() {
        let cipher = FieldCipher::from_base64_key(&generate_key()).unwrap();
        let ctx = WriteContext {
            cipher: &cipher,
            phone_region: CountryId::US,
        };
        let integration: IntegrationHub = build(
            object(json!({
                "name": "Stripe",
                "provider": "Stripe",
                "category": "payments",
                "baseUrl": "https://api.stripe.com/",
                "healthPath": "v1/health",
            })),
            &ctx,
        )
        .unwrap();

        assert_eq!(integration.provider, "stripe");
        assert_eq!(integration.base_url, "https://api.stripe.com");
        assert_eq!(integration.health_path, "/v1/health");
        assert_eq!(integration.status, IntegrationStatus::Inactive);
    }
}
