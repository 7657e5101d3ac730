use axum::{Router, response::Html, routing::get};

#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses((status = 200, description = "Server liveness page", body = String, content_type = "text/html"))
)]
pub async fn health() -> Html<&'static str> {
    Html("<p>Server is up!</p>")
}

pub fn routes() -> Router {
    Router::new().route("/", get(health))
}
