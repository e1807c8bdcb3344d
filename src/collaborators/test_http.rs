//! Local axum server for collaborator client tests.

use axum::http::{header, HeaderMap, StatusCode};
use axum::extract::Query;
use axum::response::IntoResponse;
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

/// What the handler sees of an incoming request.
pub struct Incoming {
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
}

impl Incoming {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

pub struct Reply {
    status: StatusCode,
    body: String,
}

impl Reply {
    pub fn ok(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            self.body,
        )
            .into_response()
    }
}

/// Answer every request with `handler`. Returns a base URL ending in `/api/v1`.
pub async fn serve<F>(handler: F) -> String
where
    F: Fn(&Incoming) -> Reply + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    let app = Router::new().fallback(
        move |Query(query): Query<HashMap<String, String>>, headers: HeaderMap| {
            let handler = handler.clone();
            async move { handler(&Incoming { query, headers }) }
        },
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/api/v1", addr)
}
