use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::{Filter, Rejection, Reply};

use super::{reject, with_catalog};
use crate::{
    error::ValidationError,
    filter::{Catalog, Condition, ConditionBuilder, ConditionError, ConditionValue, Operator},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewCondition {
    id: String,
    field_id: String,
}

/// One edit of a condition row. Field, operator and value changes are applied
/// in that order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionEdit {
    condition: Condition,
    field_id: Option<String>,
    operator: Option<Operator>,
    value: Option<ConditionValue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EditedCondition {
    condition: Condition,
    /// Why the condition cannot be saved yet, if it cannot.
    problem: Option<String>,
}

pub(super) fn routes(
    catalog: Arc<Catalog>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create = warp::path!("api" / "conditions")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_catalog(catalog.clone()))
        .and_then(create);
    let edit = warp::path!("api" / "conditions" / "edit")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_catalog(catalog))
        .and_then(edit);
    create.or(edit)
}

fn invalid(field: &str) -> impl Fn(ConditionError) -> Rejection + '_ {
    move |e| reject(ValidationError::new(field, e.to_string()))
}

async fn create(request: NewCondition, catalog: Arc<Catalog>) -> Result<impl Reply, Rejection> {
    let builder = ConditionBuilder::new(&catalog);
    let condition = builder
        .condition_for(request.id, &request.field_id)
        .map_err(invalid("fieldId"))?;
    Ok(warp::reply::json(&edited(builder, condition)))
}

async fn edit(request: ConditionEdit, catalog: Arc<Catalog>) -> Result<impl Reply, Rejection> {
    let builder = ConditionBuilder::new(&catalog);
    let mut condition = request.condition;
    if let Some(field_id) = request.field_id {
        condition = builder
            .with_field(&condition, &field_id)
            .map_err(invalid("fieldId"))?;
    }
    if let Some(operator) = request.operator {
        condition = builder
            .with_operator(&condition, operator)
            .map_err(invalid("operator"))?;
    }
    if let Some(value) = request.value {
        condition = builder
            .with_value(&condition, value)
            .map_err(invalid("value"))?;
    }
    Ok(warp::reply::json(&edited(builder, condition)))
}

fn edited(builder: ConditionBuilder<'_>, condition: Condition) -> EditedCondition {
    let problem = builder.validate(&condition).err().map(|e| e.to_string());
    EditedCondition { condition, problem }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use warp::{http::StatusCode, test::request};

    use crate::rest::TestApi;

    #[tokio::test]
    async fn new_rows_start_with_the_default_operator() {
        let api = TestApi::new();
        let (status, body) = api
            .call(
                request()
                    .method("POST")
                    .path("/api/conditions")
                    .json(&json!({"id": "c1", "fieldId": "tags"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["condition"],
            json!({"id": "c1", "fieldId": "tags", "operator": "contains", "value": ""})
        );
        assert_eq!(
            body["problem"],
            "operator contains needs a value to compare against"
        );

        let (status, body) = api
            .call(
                request()
                    .method("POST")
                    .path("/api/conditions")
                    .json(&json!({"id": "c1", "fieldId": "mood"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "fieldId: unknown field mood");
    }

    #[tokio::test]
    async fn edits_reset_what_no_longer_applies() {
        let api = TestApi::new();
        let condition = json!({"id": "c1", "fieldId": "status", "operator": "equals", "value": "Open"});

        let (_, body) = api
            .call(
                request()
                    .method("POST")
                    .path("/api/conditions/edit")
                    .json(&json!({"condition": condition, "operator": "is_empty"})),
            )
            .await;
        assert_eq!(body["condition"]["value"], json!(null));

        let (_, body) = api
            .call(
                request()
                    .method("POST")
                    .path("/api/conditions/edit")
                    .json(&json!({"condition": condition, "fieldId": "created_at"})),
            )
            .await;
        assert_eq!(body["condition"]["operator"], "equals");
        assert_eq!(body["condition"]["value"], "");
        assert_eq!(body["problem"], "\"\" is not a date");

        let (status, body) = api
            .call(
                request()
                    .method("POST")
                    .path("/api/conditions/edit")
                    .json(&json!({"condition": condition, "operator": "greater_than"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "operator: operator greater_than is not allowed on select field status"
        );

        let (status, body) = api
            .call(
                request()
                    .method("POST")
                    .path("/api/conditions/edit")
                    .json(&json!({"condition": condition, "operator": "in", "value": ["Open", "New"]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["condition"]["value"], json!(["Open", "New"]));
        assert_eq!(body["problem"], json!(null));
    }
}
