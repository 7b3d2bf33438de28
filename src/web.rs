use std::{net::SocketAddr, path::Path, sync::Arc};

use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql_warp::GraphQLResponse;
use tracing::info;
use warp::{http::Response as HttpResponse, Filter, Reply};

use crate::{api::Schema, database::Database, filter::Catalog, rest};

/// Serves `/graphql` and the REST routes under `/api` until the process ends.
pub async fn serve(
    schema: Schema,
    db: Database,
    catalog: Arc<Catalog>,
    addr: SocketAddr,
    tls: Option<(&Path, &Path)>,
) {
    let routes = routes(schema, db, catalog);
    match tls {
        Some((cert, key)) => {
            info!("listening on https://{addr}");
            warp::serve(routes)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .run(addr)
                .await;
        }
        None => {
            info!("listening on http://{addr}");
            warp::serve(routes).run(addr).await;
        }
    }
}

fn routes(
    schema: Schema,
    db: Database,
    catalog: Arc<Catalog>,
) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
    let graphql_post = warp::path("graphql")
        .and(warp::path::end())
        .and(async_graphql_warp::graphql(schema))
        .and_then(
            |(schema, request): (Schema, async_graphql::Request)| async move {
                Ok::<_, std::convert::Infallible>(GraphQLResponse::from(
                    schema.execute(request).await,
                ))
            },
        );
    let graphql_playground = warp::path("graphql")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            HttpResponse::builder()
                .header("content-type", "text/html")
                .body(playground_source(GraphQLPlaygroundConfig::new("/graphql")))
        });

    graphql_playground
        .or(graphql_post)
        .or(rest::routes(db, catalog))
        .recover(rest::handle_rejection)
        .with(warp::trace::request())
}
