use std::{cmp::Ordering, sync::Arc};

use warp::{Filter, Rejection, Reply};

use super::{reject, with_catalog, with_db, GroupCount, ListQuery, Page};
use crate::{
    database::{Database, Ticket},
    error::ApiError,
    filter::{compare_by, Catalog, Record},
};

pub(super) fn routes(
    db: Database,
    catalog: Arc<Catalog>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "tickets")
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_db(db.clone()))
        .and(with_catalog(catalog))
        .and_then(list);
    let read = warp::path!("api" / "tickets" / u64)
        .and(warp::get())
        .and(with_db(db))
        .and_then(read);
    list.or(read)
}

async fn list(
    query: ListQuery,
    db: Database,
    catalog: Arc<Catalog>,
) -> Result<impl Reply, Rejection> {
    let order_by = query.order_by(&catalog, None).map_err(reject)?;
    let mut tickets = db.all::<Ticket>().map_err(reject)?;
    let descending = query.sort_direction.unwrap_or_default().is_descending();
    sort_tickets(&mut tickets, None, order_by, descending);
    Ok(warp::reply::json(&Page::slice(tickets, &query)))
}

async fn read(id: u64, db: Database) -> Result<impl Reply, Rejection> {
    match db.ticket(id).map_err(reject)? {
        Some(ticket) => Ok(warp::reply::json(&ticket)),
        None => Err(reject(ApiError::not_found("ticket", id.to_string()))),
    }
}

/// Sorts by the group key first, then by `order_by`. Ties keep id order.
pub(super) fn sort_tickets(
    tickets: &mut [Ticket],
    group_by: Option<&str>,
    order_by: Option<&str>,
    descending: bool,
) {
    tickets.sort_by(|a, b| {
        let by_group = group_by.map_or(Ordering::Equal, |field| compare_by(a, b, field, false));
        by_group
            .then_with(|| {
                order_by.map_or(Ordering::Equal, |field| compare_by(a, b, field, descending))
            })
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Counts consecutive runs of the group key over tickets already sorted by it.
pub(super) fn group_counts(tickets: &[Ticket], group_by: &str) -> Vec<GroupCount> {
    let mut groups: Vec<GroupCount> = Vec::new();
    for ticket in tickets {
        let key = ticket
            .field(group_by)
            .filter(|value| !value.is_empty())
            .and_then(|value| value.display());
        match groups.last_mut() {
            Some(last) if last.key == key => last.count += 1,
            _ => groups.push(GroupCount { key, count: 1 }),
        }
    }
    groups
}
