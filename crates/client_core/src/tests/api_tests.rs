use super::*;

use axum::{routing::get, Json, Router};
use shared::protocol::{CraneDimensions, CraneLimits, CraneState};
use tokio::net::TcpListener;

async fn spawn_metadata_server() -> String {
    async fn details(
        axum::extract::Path(id): axum::extract::Path<String>,
    ) -> Json<CraneDetails> {
        Json(CraneDetails {
            id: CraneId::new(id),
            state: CraneState::default(),
            dimensions: CraneDimensions::default(),
            limits: CraneLimits::default(),
        })
    }

    let app = Router::new().route("/v1/robot/:id", get(details));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("metadata server");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn crane_details_fetches_and_maps_the_payload() {
    let base_url = spawn_metadata_server().await;
    // A trailing slash must not produce a double-slash request path.
    let api = RobotApi::new(format!("{base_url}/"));

    let details = api
        .crane_details(&CraneId::new("tower-1"))
        .await
        .expect("details");
    assert_eq!(details.id, CraneId::new("tower-1"));
    assert_eq!(details.limits, CraneLimits::default());
}

#[tokio::test]
async fn a_refused_connection_maps_to_the_unreachable_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let api = RobotApi::new(format!("http://{addr}"));
    let error = api.list_cranes().await.expect_err("no server is listening");
    assert!(matches!(error, ApiClientError::Unreachable));
}
