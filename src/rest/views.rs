use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::{
    reject, tickets::group_counts, tickets::sort_tickets, with_catalog, with_db, ListQuery, Page,
};
use crate::{
    database::{Database, Ticket, View, ViewDraft},
    error::ApiError,
    filter::{self, Catalog, ConditionGroupSet, Evaluator},
};

#[derive(Debug, Deserialize)]
struct VisibleQuery {
    division: String,
    user: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiagnosticEntry {
    condition_id: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct PreviewPage {
    #[serde(flatten)]
    page: Page<Ticket>,
    diagnostics: Vec<DiagnosticEntry>,
}

pub(super) fn routes(
    db: Database,
    catalog: Arc<Catalog>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "views")
        .and(warp::get())
        .and(warp::query::<VisibleQuery>())
        .and(with_db(db.clone()))
        .and_then(list);
    let create = warp::path!("api" / "views")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and(with_catalog(catalog.clone()))
        .and_then(create);
    let preview = warp::path!("api" / "views" / "preview")
        .and(warp::post())
        .and(warp::query::<ListQuery>())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and(with_catalog(catalog.clone()))
        .and_then(preview);
    let tickets = warp::path!("api" / "views" / String / "tickets")
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_db(db.clone()))
        .and(with_catalog(catalog.clone()))
        .and_then(view_tickets);
    let read = warp::path!("api" / "views" / String)
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(read);
    let replace = warp::path!("api" / "views" / String)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and(with_catalog(catalog))
        .and_then(replace);
    let delete = warp::path!("api" / "views" / String)
        .and(warp::delete())
        .and(with_db(db))
        .and_then(delete);

    list.or(create)
        .or(preview)
        .or(tickets)
        .or(read)
        .or(replace)
        .or(delete)
}

fn find_view(db: &Database, id: String) -> Result<View, Rejection> {
    db.view(&id)
        .map_err(reject)?
        .ok_or_else(|| reject(ApiError::not_found("view", id)))
}

async fn list(query: VisibleQuery, db: Database) -> Result<impl Reply, Rejection> {
    let views = db
        .visible_views(&query.division, query.user.as_deref())
        .map_err(reject)?;
    Ok(warp::reply::json(&views))
}

async fn create(
    draft: ViewDraft,
    db: Database,
    catalog: Arc<Catalog>,
) -> Result<impl Reply, Rejection> {
    draft.validate(&catalog).map_err(reject)?;
    let id = db.generate_id().map_err(reject)?.to_string();
    let view = View::new(id, draft, Utc::now());
    db.save_view(&view).map_err(reject)?;
    info!(view = %view.id, division = %view.draft.division_id, "view created");
    Ok(warp::reply::with_status(
        warp::reply::json(&view),
        StatusCode::CREATED,
    ))
}

async fn read(id: String, db: Database) -> Result<impl Reply, Rejection> {
    let view = find_view(&db, id)?;
    Ok(warp::reply::json(&view))
}

async fn replace(
    id: String,
    draft: ViewDraft,
    db: Database,
    catalog: Arc<Catalog>,
) -> Result<impl Reply, Rejection> {
    let mut view = find_view(&db, id)?;
    draft.validate(&catalog).map_err(reject)?;
    view.draft = draft;
    view.updated_at = Utc::now();
    db.save_view(&view).map_err(reject)?;
    Ok(warp::reply::json(&view))
}

async fn delete(id: String, db: Database) -> Result<impl Reply, Rejection> {
    if db.remove::<View>(id.as_bytes()).map_err(reject)?.is_none() {
        return Err(reject(ApiError::not_found("view", id)));
    }
    info!(view = %id, "view deleted");
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}

async fn view_tickets(
    id: String,
    query: ListQuery,
    db: Database,
    catalog: Arc<Catalog>,
) -> Result<impl Reply, Rejection> {
    let view = find_view(&db, id)?;
    let order_by = query
        .order_by(&catalog, view.draft.order_by.as_deref())
        .map_err(reject)?;
    let descending = query
        .sort_direction
        .unwrap_or(view.draft.sort_direction)
        .is_descending();
    let group_by = view.draft.group_by.as_deref();

    let stored = db.all::<Ticket>().map_err(reject)?;
    let mut tickets: Vec<Ticket> =
        filter::matching(Evaluator::new(&catalog), &view.draft.conditions, stored).collect();
    sort_tickets(&mut tickets, group_by, order_by, descending);
    let groups = group_by.map(|field| group_counts(&tickets, field));

    let mut page = Page::slice(tickets, &query);
    page.groups = groups;
    Ok(warp::reply::json(&page))
}

/// Runs conditions that have not been saved yet. Malformed conditions match
/// nothing and are reported alongside the page.
async fn preview(
    query: ListQuery,
    conditions: ConditionGroupSet,
    db: Database,
    catalog: Arc<Catalog>,
) -> Result<impl Reply, Rejection> {
    let order_by = query.order_by(&catalog, None).map_err(reject)?;
    let descending = query.sort_direction.unwrap_or_default().is_descending();
    let evaluator = Evaluator::new(&catalog);
    let diagnostics = evaluator
        .diagnose(&conditions)
        .into_iter()
        .map(|diagnostic| DiagnosticEntry {
            condition_id: diagnostic.condition_id,
            error: diagnostic.error.to_string(),
        })
        .collect();

    let stored = db.all::<Ticket>().map_err(reject)?;
    let mut tickets: Vec<Ticket> = filter::matching(evaluator, &conditions, stored).collect();
    sort_tickets(&mut tickets, None, order_by, descending);
    Ok(warp::reply::json(&PreviewPage {
        page: Page::slice(tickets, &query),
        diagnostics,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use warp::{http::StatusCode, test::request};

    use crate::{database::Ticket, rest::TestApi};

    fn ticket(id: u64, status: &str, priority: &str) -> Ticket {
        let mut ticket = Ticket::sample(id);
        ticket.status = status.to_string();
        ticket.priority = priority.to_string();
        ticket
    }

    fn open_and_pressing() -> Value {
        json!({
            "name": "Open and pressing",
            "divisionId": "d1",
            "ownerId": "u1",
            "columns": ["subject", "status", "priority"],
            "conditions": {
                "allConditions": [
                    {"id": "c1", "fieldId": "status", "operator": "equals", "value": "Open"}
                ],
                "anyConditions": [
                    {"id": "c2", "fieldId": "priority", "operator": "equals", "value": "High"},
                    {"id": "c3", "fieldId": "priority", "operator": "equals", "value": "Urgent"}
                ]
            }
        })
    }

    async fn create_view(api: &TestApi, body: &Value) -> Value {
        let (status, view) = api
            .call(request().method("POST").path("/api/views").json(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{view}");
        view
    }

    #[tokio::test]
    async fn view_lifecycle() {
        let api = TestApi::new();
        let view = create_view(&api, &open_and_pressing()).await;
        let id = view["id"].as_str().unwrap().to_string();
        assert_eq!(view["sortDirection"], "asc");
        assert_eq!(view["isPublic"], false);

        let (status, fetched) = api.call(request().path(&format!("/api/views/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, view);

        let mut body = open_and_pressing();
        body["name"] = json!("Renamed");
        body["isPublic"] = json!(true);
        let (status, updated) = api
            .call(
                request()
                    .method("PUT")
                    .path(&format!("/api/views/{id}"))
                    .json(&body),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Renamed");
        assert_eq!(updated["createdAt"], view["createdAt"]);

        let (_, visible) = api
            .call(request().path("/api/views?division=d1&user=u2"))
            .await;
        assert_eq!(visible.as_array().unwrap().len(), 1);

        let (status, _) = api
            .call(request().method("DELETE").path(&format!("/api/views/{id}")))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = api
            .call(request().method("DELETE").path(&format!("/api/views/{id}")))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listing_requires_a_division() {
        let api = TestApi::new();
        let (status, _) = api.call(request().path("/api/views?user=u1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_conditions_are_refused() {
        let api = TestApi::new();
        let mut body = open_and_pressing();
        body["conditions"]["allConditions"][0]["operator"] = json!("contains");
        let (status, error) = api
            .call(request().method("POST").path("/api/views").json(&body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            error["error"],
            "conditions.allConditions[0]: operator contains is not allowed on select field status"
        );

        let mut body = open_and_pressing();
        body["conditions"]["anyConditions"][1] =
            json!({"id": "c3", "fieldId": "tags", "operator": "in", "value": []});
        let (status, error) = api
            .call(request().method("POST").path("/api/views").json(&body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            error["error"],
            "conditions.anyConditions[1]: operator in needs a value to compare against"
        );
    }

    #[tokio::test]
    async fn applying_a_view() {
        let api = TestApi::new();
        api.db()
            .insert_tickets(vec![
                ticket(1, "Open", "High"),
                ticket(2, "Open", "Low"),
                ticket(3, "Closed", "Urgent"),
                ticket(4, "Open", "Urgent"),
            ])
            .unwrap();
        let mut body = open_and_pressing();
        body["groupBy"] = json!("priority");
        let view = create_view(&api, &body).await;
        let id = view["id"].as_str().unwrap();

        let (status, page) = api
            .call(request().path(&format!("/api/views/{id}/tickets")))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 2);
        let ids: Vec<u64> = page["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|ticket| ticket["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(
            page["groups"],
            json!([{"key": "High", "count": 1}, {"key": "Urgent", "count": 1}])
        );

        let (status, _) = api
            .call(request().path("/api/views/missing/tickets"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preview_reports_malformed_conditions() {
        let api = TestApi::new();
        api.db()
            .insert_tickets(vec![ticket(1, "Open", "High"), ticket(2, "Solved", "Low")])
            .unwrap();
        let conditions = json!({
            "allConditions": [],
            "anyConditions": [
                {"id": "a", "fieldId": "status", "operator": "in", "value": ["Solved"]},
                {"id": "b", "fieldId": "mood", "operator": "equals", "value": "angry"}
            ]
        });
        let (status, page) = api
            .call(
                request()
                    .method("POST")
                    .path("/api/views/preview")
                    .json(&conditions),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["id"], 2);
        assert_eq!(
            page["diagnostics"],
            json!([{"conditionId": "b", "error": "unknown field mood"}])
        );
    }

    #[tokio::test]
    async fn a_new_default_view_replaces_the_old_one() {
        let api = TestApi::new();
        let mut body = open_and_pressing();
        body["isDefault"] = json!(true);
        body["isPublic"] = json!(true);
        let first = create_view(&api, &body).await;
        let second = create_view(&api, &body).await;

        let (_, first) = api
            .call(request().path(&format!("/api/views/{}", first["id"].as_str().unwrap())))
            .await;
        assert_eq!(first["isDefault"], false);
        assert_eq!(second["isDefault"], true);
    }
}
