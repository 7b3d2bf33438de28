//! JSON routes under `/api` used by the admin dashboard.

mod conditions;
mod directory;
mod tickets;
mod views;

use std::{convert::Infallible, sync::Arc};

use async_graphql_warp::GraphQLBadRequest;
use serde::{Deserialize, Serialize};
use tracing::error;
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{InvalidQuery, MethodNotAllowed},
    Filter, Rejection, Reply,
};

use crate::{
    database::{CustomField, Database, Form, Group, Member, SortDirection, Tag},
    error::{ApiError, ValidationError},
    filter::{default_operator_for, Catalog, Operator, ValueType},
};

const DEFAULT_PAGE_SIZE: usize = 25;
const MAX_PAGE_SIZE: usize = 100;

pub(crate) fn routes(
    db: Database,
    catalog: Arc<Catalog>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    fields(catalog.clone())
        .or(conditions::routes(catalog.clone()))
        .or(views::routes(db.clone(), catalog.clone()))
        .or(tickets::routes(db.clone(), catalog))
        .or(directory::routes::<Tag>(db.clone()))
        .or(directory::routes::<Group>(db.clone()))
        .or(directory::routes::<Member>(db.clone()))
        .or(directory::routes::<CustomField>(db.clone()))
        .or(directory::routes::<Form>(db))
}

fn with_db(db: Database) -> impl Filter<Extract = (Database,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

fn with_catalog(
    catalog: Arc<Catalog>,
) -> impl Filter<Extract = (Arc<Catalog>,), Error = Infallible> + Clone {
    warp::any().map(move || catalog.clone())
}

fn reject(e: impl Into<ApiError>) -> Rejection {
    warp::reject::custom(e.into())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldEntry<'a> {
    id: &'a str,
    label: &'a str,
    value_type: ValueType,
    operators: &'static [Operator],
    default_operator: Operator,
}

fn fields(
    catalog: Arc<Catalog>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "fields")
        .and(warp::get())
        .and(with_catalog(catalog))
        .map(|catalog: Arc<Catalog>| {
            let entries: Vec<FieldEntry> = catalog
                .fields()
                .iter()
                .map(|field| FieldEntry {
                    id: &field.id,
                    label: &field.label,
                    value_type: field.value_type,
                    operators: field.value_type.operators(),
                    default_operator: default_operator_for(field.value_type),
                })
                .collect();
            warp::reply::json(&entries)
        })
}

/// Paging and ordering parameters shared by the list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page: Option<usize>,
    page_size: Option<usize>,
    order_by: Option<String>,
    sort_direction: Option<SortDirection>,
}

impl ListQuery {
    fn order_by<'a>(
        &'a self,
        catalog: &Catalog,
        fallback: Option<&'a str>,
    ) -> Result<Option<&'a str>, ValidationError> {
        match self.order_by.as_deref() {
            Some(field) if !catalog.contains(field) => Err(ValidationError::new(
                "orderBy",
                format!("unknown field {field}"),
            )),
            Some(field) => Ok(Some(field)),
            None => Ok(fallback),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct GroupCount {
    key: Option<String>,
    count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    items: Vec<T>,
    total: usize,
    page: usize,
    page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<Vec<GroupCount>>,
}

impl<T> Page<T> {
    /// Cuts one page out of `items`. Pages are 1-based; a page past the end
    /// is empty.
    fn slice(items: Vec<T>, query: &ListQuery) -> Self {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let total = items.len();
        let items = items
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        Self {
            items,
            total,
            page,
            page_size,
            groups: None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Turns rejections into `{"error": ...}` bodies.
pub(crate) async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(e) = rejection.find::<ApiError>() {
        match e {
            ApiError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Invalid(_) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Storage(_) => {
                error!("{e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal storage error".to_string(),
                )
            }
        }
    } else if let Some(e) = rejection.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = rejection.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(GraphQLBadRequest(e)) = rejection.find::<GraphQLBadRequest>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if rejection.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
        )
    } else {
        error!("unhandled rejection: {rejection:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { error: message }),
        status,
    ))
}

#[cfg(test)]
pub(crate) struct TestApi {
    pub(crate) test: crate::database::TestDatabase,
    pub(crate) catalog: Arc<Catalog>,
}

#[cfg(test)]
impl TestApi {
    pub(crate) fn new() -> Self {
        Self {
            test: crate::database::TestDatabase::new(),
            catalog: Arc::new(Catalog::ticket_fields().unwrap()),
        }
    }

    pub(crate) fn db(&self) -> &Database {
        &self.test.db
    }

    /// Sends `request` through the routes and returns the status and JSON
    /// body (`Null` when the body is empty).
    pub(crate) async fn call(
        &self,
        request: warp::test::RequestBuilder,
    ) -> (StatusCode, serde_json::Value) {
        let api = routes(self.db().clone(), self.catalog.clone()).recover(handle_rejection);
        let response = request.reply(&api).await;
        let body = if response.body().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(response.body()).unwrap()
        };
        (response.status(), body)
    }
}
