use axum::{
    Router,
    extract::MatchedPath,
    http::{HeaderName, Request},
};
use tether_common::views::ApiErrorResponse;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info_span;
use utoipa::{
    ToSchema,
    openapi::{Info, License, OpenApi, RefOr, path::Operation},
};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{context::ApiContext, handlers};

const REQUEST_ID_HEADER: &str = "x-request-id";

fn routes() -> OpenApiRouter<ApiContext> {
    let openapi = OpenApi::builder()
        .info(
            Info::builder()
                .title("Tether API Reference")
                .version(env!("CARGO_PKG_VERSION"))
                .license(Some(
                    License::builder()
                        .name("Apache 2.0 License")
                        .identifier(Some(env!("CARGO_PKG_LICENSE")))
                        .build(),
                )),
        )
        .build();

    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(handlers::health_check))
        .routes(routes!(handlers::agents::pair_agent))
        .routes(routes!(handlers::agents::agent_heartbeat))
        .routes(routes!(handlers::agents::agent_active_policies))
}

/// The full API router, ready to serve.
pub fn make(context: ApiContext) -> Router {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                let request_id = req
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok());

                let path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str)
                    .unwrap_or_else(|| req.uri().path());

                info_span!(
                    "http_request",
                    method = req.method().to_string(),
                    request_id,
                    path,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(x_request_id));

    let (router, _) = routes()
        .layer(middleware)
        .with_state(context)
        .split_for_parts();

    router
}

/// The OpenAPI document describing [`make`]'s routes.
pub fn openapi() -> OpenApi {
    let (_, mut api) = routes().split_for_parts();

    api.paths.paths.iter_mut().for_each(|(_path, item)| {
        apply_default_errors(&mut item.get);
        apply_default_errors(&mut item.post);
    });

    api
}

fn apply_default_errors(item: &mut Option<Operation>) {
    if let Some(item) = item {
        item.responses.responses.insert(
            "500".into(),
            RefOr::Ref(
                utoipa::openapi::Ref::builder()
                    .summary("Internal server error")
                    .ref_location_from_schema_name(ApiErrorResponse::name())
                    .build(),
            ),
        );
    }
}
