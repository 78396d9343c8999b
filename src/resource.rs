//! The contract every REST resource implements.

use phonenumber::country::Id as CountryId;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::auth::Role;
use crate::crypto::FieldCipher;
use crate::errors::AppError;
use crate::query::FilterField;
use crate::store::{StatsSpec, StoredDocument};

/// A parent reference with its own listing route, e.g. `/product/:id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Body field holding the parent id.
    pub field: &'static str,
    /// Path segment of the listing route.
    pub segment: &'static str,
}

pub const PRODUCT: Relation = Relation {
    field: "productId",
    segment: "product",
};

/// A body field computed from other fields unless the client sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub field: &'static str,
    pub inputs: &'static [&'static str],
}

/// Services available to `normalize` hooks.
pub struct WriteContext<'a> {
    pub cipher: &'a FieldCipher,
    pub phone_region: CountryId,
}

pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name in the store.
    const COLLECTION: &'static str;
    /// Envelope key for one document.
    const SINGULAR: &'static str;
    /// Envelope key for a listing.
    const PLURAL: &'static str;
    const FILTERS: &'static [FilterField];
    const STATS: Option<StatsSpec> = None;
    const RELATION: Option<Relation> = None;
    /// Body fields that must be unique across all workspaces.
    const UNIQUE: &'static [&'static str] = &[];
    /// Fields `normalize` computes from others, paired with their inputs.
    const DERIVED: &'static [Derived] = &[];
    const READ_ROLES: &'static [Role] = Role::ALL;
    const WRITE_ROLES: &'static [Role] = Role::STAFF;

    /// Defaults, canonical forms and derived fields, applied before validation.
    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError>;

    /// Outgoing JSON body.
    fn present(&self) -> Result<Value, AppError> {
        serde_json::to_value(self)
            .map_err(|e| AppError::InternalError(format!("Serializing {}: {}", Self::SINGULAR, e)))
    }
}

/// Keys a client may not write into the body.
const RESERVED_KEYS: &[&str] = &["id", "_id", "createdAt", "updatedAt", "workspaceId"];

/// Splits a request body into the body fields and the optional `isActive` flag.
pub fn split_body(body: Value) -> Result<(Map<String, Value>, Option<bool>), AppError> {
    let Value::Object(mut fields) = body else {
        return Err(AppError::BadRequest("Request body must be a JSON object".into()));
    };

    let is_active = match fields.remove("isActive") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(b),
        Some(_) => return Err(AppError::BadRequest("isActive must be a boolean".into())),
    };

    for key in RESERVED_KEYS {
        fields.remove(*key);
    }

    Ok((fields, is_active))
}

/// Applies a PATCH body on top of a stored body.
///
/// A derived field is dropped from the stored side when the patch changes
/// one of its inputs without setting the field itself, so `normalize`
/// computes it again from the new values.
///
/// # Arguments
/// * `stored` - Body currently in the store
/// * `patch` - Client fields, already stripped of reserved keys
///
/// # Returns
/// * `Map<String, Value>` - The body to rebuild `R` from
pub fn merge_patch<R: Resource>(
    stored: Value,
    patch: Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = match stored {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for derived in R::DERIVED {
        let inputs_changed = derived
            .inputs
            .iter()
            .any(|input| patch.get(*input).is_some_and(|v| merged.get(*input) != Some(v)));
        if inputs_changed && !patch.contains_key(derived.field) {
            merged.remove(derived.field);
        }
    }

    merged.extend(patch);
    merged
}

/// Deserializes, normalizes and validates a body into `R`.
pub fn build<R: Resource>(fields: Map<String, Value>, ctx: &WriteContext<'_>) -> Result<R, AppError> {
    let mut resource: R = serde_json::from_value(Value::Object(fields))
        .map_err(|e| AppError::BadRequest(format!("Invalid input data. {}", e)))?;
    resource.normalize(ctx)?;
    resource.validate()?;
    Ok(resource)
}

pub fn to_data<R: Resource>(resource: &R) -> Result<Value, AppError> {
    serde_json::to_value(resource)
        .map_err(|e| AppError::InternalError(format!("Serializing {}: {}", R::SINGULAR, e)))
}

/// Stored document to outgoing JSON: body plus `id`, `isActive` and timestamps.
pub fn render<R: Resource>(doc: &StoredDocument) -> Result<Value, AppError> {
    let resource: R = serde_json::from_value(doc.data.clone()).map_err(|e| {
        AppError::InternalError(format!("Stored {} {} is malformed: {}", R::SINGULAR, doc.id, e))
    })?;

    let mut out = match resource.present()? {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    };

    out.insert("id".into(), Value::String(doc.id.to_string()));
    out.insert("isActive".into(), Value::Bool(doc.is_active));
    out.insert("createdAt".into(), Value::String(doc.created_at.to_rfc3339()));
    out.insert("updatedAt".into(), Value::String(doc.updated_at.to_rfc3339()));
    Ok(Value::Object(out))
}
