//! `{status, data}` response envelopes.

use serde_json::{json, Map, Value};

use crate::errors::AppError;
use crate::query::ListQuery;
use crate::resource::{render, Resource};
use crate::store::{FindResult, StoredDocument};

/// `{"status": "success", "data": data}`
pub fn success(data: Value) -> Value {
    json!({ "status": "success", "data": data })
}

fn keyed(key: &str, value: Value) -> Value {
    let mut data = Map::new();
    data.insert(key.to_string(), value);
    Value::Object(data)
}

/// One document under the resource's singular key.
pub fn one<R: Resource>(doc: &StoredDocument) -> Result<Value, AppError> {
    Ok(success(keyed(R::SINGULAR, render::<R>(doc)?)))
}

/// A page of documents under the resource's plural key.
pub fn page<R: Resource>(found: &FindResult, query: &ListQuery) -> Result<Value, AppError> {
    let docs = found
        .documents
        .iter()
        .map(render::<R>)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "status": "success",
        "results": docs.len(),
        "total": found.total,
        "page": query.page,
        "data": keyed(R::PLURAL, Value::Array(docs)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Country;
    use uuid::Uuid;

    #[test]
    fn test_one_uses_singular_key() {
        let doc = StoredDocument::new(
            "countries",
            Uuid::new_v4(),
            json!({"code": "BR", "name": "Brazil", "visitors": 10, "sessions": 12, "revenue": 0.0}),
            true,
        );
        let body = one::<Country>(&doc).unwrap();

        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["country"]["code"], "BR");
        assert_eq!(body["data"]["country"]["id"], doc.id.to_string());
    }
}
