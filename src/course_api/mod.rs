mod models;
mod routes;
mod services;

use std::sync::Arc;

use poem::{
    Endpoint, EndpointExt, Route,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use tokio::sync::Mutex;

use crate::domain::session::CourseSession;

/// API routes plus the RapiDoc UI at `/ui` and the OpenAPI document at `/spec`.
pub fn app(session: Arc<Mutex<CourseSession>>, public_url: String) -> impl Endpoint {
    let version = env!("CARGO_PKG_VERSION");
    let api = routes::CourseApi { session };
    let api_service = OpenApiService::new(api, "Course Progress API", version).server(public_url);
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    Route::new()
        .nest("/", api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing)
}
