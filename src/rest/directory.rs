use tracing::info;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::{reject, with_db};
use crate::{
    database::{Database, DirectoryEntity},
    error::ApiError,
};

/// CRUD routes for one directory kind under `/api/{kind}`.
pub(super) fn routes<T: DirectoryEntity>(
    db: Database,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let collection = warp::path("api")
        .and(warp::path(T::KIND))
        .and(warp::path::end());
    let item = warp::path("api")
        .and(warp::path(T::KIND))
        .and(warp::path::param::<String>())
        .and(warp::path::end());

    let list = collection
        .clone()
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(list::<T>);
    let create = collection
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(create::<T>);
    let read = item
        .clone()
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(read::<T>);
    let replace = item
        .clone()
        .and(warp::put())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(replace::<T>);
    let delete = item
        .and(warp::delete())
        .and(with_db(db))
        .and_then(delete::<T>);

    list.or(create).or(read).or(replace).or(delete)
}

async fn list<T: DirectoryEntity>(db: Database) -> Result<impl Reply, Rejection> {
    let entities = db.all::<T>().map_err(reject)?;
    Ok(warp::reply::json(&entities))
}

async fn create<T: DirectoryEntity>(mut entity: T, db: Database) -> Result<impl Reply, Rejection> {
    entity.set_id(db.generate_id().map_err(reject)?.to_string());
    entity.validate(&db).map_err(reject)?;
    db.insert(&entity).map_err(reject)?;
    info!(kind = T::NAME, id = entity.id(), "created");
    Ok(warp::reply::with_status(
        warp::reply::json(&entity),
        StatusCode::CREATED,
    ))
}

async fn read<T: DirectoryEntity>(id: String, db: Database) -> Result<impl Reply, Rejection> {
    match db.get::<T>(id.as_bytes()).map_err(reject)? {
        Some(entity) => Ok(warp::reply::json(&entity)),
        None => Err(reject(ApiError::not_found(T::NAME, id))),
    }
}

async fn replace<T: DirectoryEntity>(
    id: String,
    mut entity: T,
    db: Database,
) -> Result<impl Reply, Rejection> {
    if db.get::<T>(id.as_bytes()).map_err(reject)?.is_none() {
        return Err(reject(ApiError::not_found(T::NAME, id)));
    }
    entity.set_id(id);
    entity.validate(&db).map_err(reject)?;
    db.insert(&entity).map_err(reject)?;
    Ok(warp::reply::json(&entity))
}

async fn delete<T: DirectoryEntity>(id: String, db: Database) -> Result<impl Reply, Rejection> {
    if db.remove::<T>(id.as_bytes()).map_err(reject)?.is_none() {
        return Err(reject(ApiError::not_found(T::NAME, id)));
    }
    T::detach(&db, &id).map_err(reject)?;
    info!(kind = T::NAME, %id, "deleted");
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}
