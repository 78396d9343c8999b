//! List query parsing: filters, sorting and pagination.
//!
//! Query strings look like `status=new&score[gte]=50&sort=-value,name&page=2&limit=10`.
//! Only fields a resource declares in its filter list are accepted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;

/// How a filterable field is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    Enum(&'static [&'static str]),
    Number,
    Bool,
    Id,
    Date,
}

/// A body field that may be used in filters and sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterField {
    pub name: &'static str,
    pub kind: FilterKind,
}

impl FilterField {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: FilterKind::Text }
    }

    pub const fn one_of(name: &'static str, values: &'static [&'static str]) -> Self {
        Self { name, kind: FilterKind::Enum(values) }
    }

    pub const fn number(name: &'static str) -> Self {
        Self { name, kind: FilterKind::Number }
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self { name, kind: FilterKind::Bool }
    }

    pub const fn id(name: &'static str) -> Self {
        Self { name, kind: FilterKind::Id }
    }

    pub const fn date(name: &'static str) -> Self {
        Self { name, kind: FilterKind::Date }
    }
}

/// Where a filter or sort key reads its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// A top-level key of the document body.
    Data(&'static str),
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Op {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "eq" => Some(Op::Eq),
            "ne" => Some(Op::Ne),
            "gt" => Some(Op::Gt),
            "gte" => Some(Op::Gte),
            "lt" => Some(Op::Lt),
            "lte" => Some(Op::Lte),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "IS DISTINCT FROM",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
        }
    }

    /// Whether `ordering` (of document value against the filter value) satisfies the operator.
    pub fn accepts(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Op::Eq => ordering == Equal,
            Op::Ne => ordering != Equal,
            Op::Gt => ordering == Greater,
            Op::Gte => ordering != Less,
            Op::Lt => ordering == Less,
            Op::Lte => ordering != Greater,
        }
    }

    fn is_range(&self) -> bool {
        matches!(self, Op::Gt | Op::Gte | Op::Lt | Op::Lte)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: Field,
    pub op: Op,
    pub value: FilterValue,
}

impl Filter {
    /// Equality on a body field holding an id.
    pub fn id_eq(field: &'static str, id: Uuid) -> Self {
        Self {
            field: Field::Data(field),
            op: Op::Eq,
            value: FilterValue::Text(id.to_string()),
        }
    }

    pub fn bool_eq(field: &'static str, value: bool) -> Self {
        Self {
            field: Field::Data(field),
            op: Op::Eq,
            value: FilterValue::Bool(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: Field,
    pub descending: bool,
}

/// Page bounds from configuration.
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub page: u32,
    pub limit: u32,
}

impl ListQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Parses decoded query pairs against the declared `fields`.
    pub fn parse(
        pairs: &[(String, String)],
        fields: &[FilterField],
        limits: PageLimits,
    ) -> Result<Self, AppError> {
        let mut query = ListQuery {
            filters: Vec::new(),
            sort: vec![SortKey {
                field: Field::CreatedAt,
                descending: true,
            }],
            page: 1,
            limit: limits.default_limit,
        };

        for (key, raw) in pairs {
            match key.as_str() {
                "page" => {
                    query.page = raw
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p >= 1)
                        .ok_or_else(|| {
                            AppError::BadRequest("page must be a positive integer".into())
                        })?;
                }
                "limit" => {
                    query.limit = raw
                        .parse::<u32>()
                        .ok()
                        .filter(|l| *l >= 1 && *l <= limits.max_limit)
                        .ok_or_else(|| {
                            AppError::BadRequest(format!(
                                "limit must be between 1 and {}",
                                limits.max_limit
                            ))
                        })?;
                }
                "sort" => query.sort = parse_sort(raw, fields)?,
                _ => query.filters.push(parse_filter(key, raw, fields)?),
            }
        }

        Ok(query)
    }
}

/// Splits `score[gte]` into `("score", Op::Gte)`.
fn split_operator(key: &str) -> Result<(&str, Op), AppError> {
    let Some(open) = key.find('[') else {
        return Ok((key, Op::Eq));
    };

    let name = &key[..open];
    let op = key[open..]
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(Op::parse)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid filter operator in '{}'", key)))?;

    Ok((name, op))
}

/// Resolves a field name to where it lives, with its kind.
fn resolve_field(name: &str, fields: &[FilterField]) -> Option<(Field, FilterKind)> {
    match name {
        "isActive" => Some((Field::IsActive, FilterKind::Bool)),
        "createdAt" => Some((Field::CreatedAt, FilterKind::Date)),
        "updatedAt" => Some((Field::UpdatedAt, FilterKind::Date)),
        _ => fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| (Field::Data(f.name), f.kind)),
    }
}

fn parse_filter(key: &str, raw: &str, fields: &[FilterField]) -> Result<Filter, AppError> {
    let (name, op) = split_operator(key)?;
    let (field, kind) = resolve_field(name, fields)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown filter field '{}'", name)))?;

    let ranged = matches!(kind, FilterKind::Number | FilterKind::Date);
    if op.is_range() && !ranged {
        return Err(AppError::BadRequest(format!(
            "Range operators are not supported on '{}'",
            name
        )));
    }

    let value = match kind {
        FilterKind::Text => FilterValue::Text(raw.to_string()),
        FilterKind::Enum(allowed) => {
            if !allowed.contains(&raw) {
                return Err(AppError::BadRequest(format!(
                    "Invalid value '{}' for '{}', expected one of: {}",
                    raw,
                    name,
                    allowed.join(", ")
                )));
            }
            FilterValue::Text(raw.to_string())
        }
        FilterKind::Number => {
            let n = raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| {
                    AppError::BadRequest(format!("'{}' must be a number", name))
                })?;
            FilterValue::Number(n)
        }
        FilterKind::Bool => match raw {
            "true" => FilterValue::Bool(true),
            "false" => FilterValue::Bool(false),
            _ => {
                return Err(AppError::BadRequest(format!(
                    "'{}' must be true or false",
                    name
                )))
            }
        },
        FilterKind::Id => {
            let id = Uuid::parse_str(raw)
                .map_err(|_| AppError::BadRequest(format!("'{}' must be a valid id", name)))?;
            FilterValue::Text(id.to_string())
        }
        FilterKind::Date => FilterValue::Date(parse_date(raw).ok_or_else(|| {
            AppError::BadRequest(format!(
                "'{}' must be an RFC 3339 timestamp or YYYY-MM-DD date",
                name
            ))
        })?),
    };

    Ok(Filter { field, op, value })
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_sort(raw: &str, fields: &[FilterField]) -> Result<Vec<SortKey>, AppError> {
    let mut keys = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (descending, name) = match part.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, part),
        };
        let (field, _) = resolve_field(name, fields)
            .ok_or_else(|| AppError::BadRequest(format!("Cannot sort by '{}'", name)))?;
        keys.push(SortKey { field, descending });
    }

    if keys.is_empty() {
        return Err(AppError::BadRequest("sort must name at least one field".into()));
    }
    Ok(keys)
}

/// Decodes a raw query string into key/value pairs.
pub fn decode_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .into_owned()
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[FilterField] = &[
        FilterField::one_of("status", &["new", "contacted"]),
        FilterField::number("score"),
        FilterField::id("assignedTo"),
        FilterField::text("email"),
        FilterField::date("date"),
    ];

    const LIMITS: PageLimits = PageLimits {
        default_limit: 20,
        max_limit: 100,
    };

    fn parse(q: &str) -> Result<ListQuery, AppError> {
        ListQuery::parse(&decode_pairs(Some(q)), FIELDS, LIMITS)
    }

    #[test]
    fn test_defaults() {
        let q = parse("").unwrap();
        assert!(q.filters.is_empty());
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, 20);
        assert_eq!(
            q.sort,
            vec![SortKey {
                field: Field::CreatedAt,
                descending: true
            }]
        );
    }

    #[test]
    fn test_equality_and_range_filters() {
        let q = parse("status=new&score[gte]=50&score[lt]=90").unwrap();
        assert_eq!(q.filters.len(), 3);
        assert_eq!(
            q.filters[0],
            Filter {
                field: Field::Data("status"),
                op: Op::Eq,
                value: FilterValue::Text("new".into()),
            }
        );
        assert_eq!(q.filters[1].op, Op::Gte);
        assert_eq!(q.filters[1].value, FilterValue::Number(50.0));
        assert_eq!(q.filters[2].op, Op::Lt);
    }

    #[test]
    fn test_bracket_keys_arrive_percent_encoded() {
        let q = parse("score%5Bgt%5D=10").unwrap();
        assert_eq!(q.filters[0].op, Op::Gt);
    }

    #[test]
    fn test_rejects_unknown_fields_and_bad_values() {
        assert!(parse("password=x").is_err());
        assert!(parse("status=archived").is_err());
        assert!(parse("score=lots").is_err());
        assert!(parse("assignedTo=42").is_err());
        assert!(parse("status[gte]=new").is_err());
        assert!(parse("score[between]=1").is_err());
        assert!(parse("isActive=yes").is_err());
    }

    #[test]
    fn test_meta_fields() {
        let q = parse("isActive=false&createdAt[gte]=2024-01-01").unwrap();
        assert_eq!(q.filters[0].field, Field::IsActive);
        assert_eq!(q.filters[0].value, FilterValue::Bool(false));
        assert_eq!(q.filters[1].field, Field::CreatedAt);
        assert!(matches!(q.filters[1].value, FilterValue::Date(_)));
    }

    #[test]
    fn test_sort_and_paging() {
        let q = parse("sort=-score,email&page=3&limit=10").unwrap();
        assert_eq!(q.sort.len(), 2);
        assert!(q.sort[0].descending);
        assert_eq!(q.sort[1].field, Field::Data("email"));
        assert_eq!(q.offset(), 20);

        assert!(parse("page=0").is_err());
        assert!(parse("limit=1000").is_err());
        assert!(parse("sort=secret").is_err());
        assert!(parse("sort=,").is_err());
    }

    #[test]
    fn test_id_filter_is_normalized() {
        let q = parse("assignedTo=6F9619FF-8B86-D011-B42D-00C04FC964FF").unwrap();
        assert_eq!(
            q.filters[0].value,
            FilterValue::Text("6f9619ff-8b86-d011-b42d-00c04fc964ff".into())
        );
    }
}
