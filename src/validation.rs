//! Field validators shared by the resource models.
//!
//! Models collect every problem with [`Checks`] and report them together as a
//! single 400, the way schema validation reports all failing paths at once.

use std::net::IpAddr;
use std::sync::LazyLock;

use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;

use crate::errors::AppError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email regex")
});

static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("color regex"));

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z][a-z0-9-]{0,61}[a-z0-9]$")
        .expect("hostname regex")
});

/// Accumulates validation failures for one document.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<String>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` when `ok` is false.
    pub fn check(mut self, ok: bool, message: impl Into<String>) -> Self {
        if !ok {
            self.errors.push(message.into());
        }
        self
    }

    pub fn required(self, field: &str, value: &str) -> Self {
        self.check(!value.trim().is_empty(), format!("{} is required", field))
    }

    pub fn max_len(self, field: &str, value: &str, max: usize) -> Self {
        self.check(
            value.chars().count() <= max,
            format!("{} must be at most {} characters", field, max),
        )
    }

    pub fn range(self, field: &str, value: f64, min: f64, max: f64) -> Self {
        self.check(
            value.is_finite() && value >= min && value <= max,
            format!("{} must be between {} and {}", field, min, max),
        )
    }

    pub fn non_negative(self, field: &str, value: f64) -> Self {
        self.check(
            value.is_finite() && value >= 0.0,
            format!("{} must not be negative", field),
        )
    }

    pub fn finite(self, field: &str, value: f64) -> Self {
        self.check(value.is_finite(), format!("{} must be a number", field))
    }

    pub fn email(self, field: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.check(is_valid_email(v), format!("{} is not a valid email", field)),
            None => self,
        }
    }

    pub fn http_url(self, field: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.check(
                is_http_url(v),
                format!("{} must be an http or https URL", field),
            ),
            None => self,
        }
    }

    pub fn http_urls(self, field: &str, values: &[String]) -> Self {
        let ok = values.iter().all(|v| is_http_url(v));
        self.check(ok, format!("{} must only contain http or https URLs", field))
    }

    pub fn hex_color(self, field: &str, value: &str) -> Self {
        self.check(
            HEX_COLOR_RE.is_match(value),
            format!("{} must be a hex color like #1a2b3c", field),
        )
    }

    pub fn currency(self, field: &str, value: &str) -> Self {
        self.check(
            is_currency_code(value),
            format!("{} must be a 3-letter currency code", field),
        )
    }

    pub fn country_code(self, field: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.check(
                is_country_code(v),
                format!("{} must be a 2-letter country code", field),
            ),
            None => self,
        }
    }

    /// Finishes validation: `Ok` when nothing failed.
    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(AppError::BadRequest(format!(
            "Invalid input data. {}",
            self.errors.join(". ")
        )))
    }
}

/// Basic email shape check: local part, `@`, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    email.len() >= 5 && email.len() <= 254 && EMAIL_RE.is_match(email)
}

pub fn is_http_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Lower-case DNS hostname with at least two labels.
pub fn is_hostname(value: &str) -> bool {
    value.len() <= 253 && HOSTNAME_RE.is_match(value)
}

pub fn is_currency_code(value: &str) -> bool {
    value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

pub fn is_country_code(value: &str) -> bool {
    value.len() == 2 && value.chars().all(|c| c.is_ascii_uppercase())
}

/// `YYYY-MM` with a real month.
pub fn is_period(value: &str) -> bool {
    chrono::NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").is_ok()
        && value.len() == 7
}

/// An IP address or CIDR block (`10.0.0.0/8`, `2001:db8::/32`).
pub fn is_ip_or_cidr(value: &str) -> bool {
    let (addr, prefix) = match value.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (value, None),
    };

    let Ok(ip) = addr.parse::<IpAddr>() else {
        return false;
    };

    match prefix {
        None => true,
        Some(p) => {
            let max = if ip.is_ipv4() { 32 } else { 128 };
            p.parse::<u8>().map(|bits| bits <= max).unwrap_or(false)
        }
    }
}

/// Parses a phone number and returns it in E.164 form.
///
/// Numbers without a leading `+` are read in `default_region`.
pub fn normalize_phone(raw: &str, default_region: CountryId) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() < 6 {
        return Err("Phone too short".to_string());
    }

    match phonenumber::parse(Some(default_region), trimmed) {
        Ok(number) => {
            if phonenumber::is_valid(&number) {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("Valid phone: {} -> {}", trimmed, formatted);
                Ok(formatted)
            } else {
                Err(format!("Invalid phone number: {}", trimmed))
            }
        }
        Err(e) => Err(format!("Unparseable phone number '{}': {:?}", trimmed, e)),
    }
}
