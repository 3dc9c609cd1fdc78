//! HTTP surface tests
//!
//! Drives the router in-process with an in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use consignment_backend::config::{
    Config, DatabaseConfig, JwtConfig, ReceiptConfig, ServerConfig, SettlementConfig,
};
use consignment_backend::middleware::Claims;
use consignment_backend::services::{CsvReceiptRenderer, StaticAdminCheck, SuitcaseLocks};
use consignment_backend::store::InMemoryStore;
use consignment_backend::{create_app, AppState};

const SECRET: &str = "test-secret";

fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 0,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        settlement: SettlementConfig::default(),
        receipts: ReceiptConfig {
            output_dir: std::env::temp_dir()
                .join(format!("consign-api-{}", Uuid::new_v4()))
                .to_string_lossy()
                .into_owned(),
            public_base_url: "/receipts".to_string(),
        },
    }
}

fn app(store: &InMemoryStore, admin_id: Uuid) -> Router {
    let config = test_config();
    let receipts = CsvReceiptRenderer::new(
        config.receipts.output_dir.clone(),
        config.receipts.public_base_url.clone(),
    );
    create_app(AppState {
        store: Arc::new(store.clone()),
        config: Arc::new(config),
        locks: SuitcaseLocks::new(),
        admin_check: Arc::new(StaticAdminCheck::new([admin_id])),
        receipts: Arc::new(receipts),
    })
}

fn token_for(user_id: Uuid) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let store = InMemoryStore::new();
    let response = app(&store, Uuid::new_v4())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_settlements_require_token() {
    let store = InMemoryStore::new();
    let response = app(&store, Uuid::new_v4())
        .oneshot(
            Request::get("/api/v1/settlements")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_forged_token_is_rejected() {
    let store = InMemoryStore::new();
    let response = app(&store, Uuid::new_v4())
        .oneshot(
            Request::get("/api/v1/settlements")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_settle_and_reverse_over_http() {
    let store = InMemoryStore::new();
    let admin_id = Uuid::new_v4();
    let seller = store.add_seller("Joana", None).unwrap();
    let suitcase = store.add_suitcase("MAL-HTTP", seller.id).unwrap();
    let stock = store
        .add_inventory_item("PULSEIRA-9", Decimal::from(80), 3)
        .unwrap();
    let app = app(&store, admin_id);
    let bearer = format!("Bearer {}", token_for(admin_id));

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/suitcases/{}/items", suitcase.id))
                .header(header::AUTHORIZATION, &bearer)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "inventory_id": stock.id, "quantity": 1 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/settlements")
                .header(header::AUTHORIZATION, &bearer)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "suitcase_id": suitcase.id,
                        "seller_id": seller.id,
                        "settlement_date": "2024-06-01",
                        "items_present": []
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let settlement_id = created["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/v1/settlements/{}", settlement_id))
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], true);
}

#[tokio::test]
async fn test_reversal_by_non_admin_is_forbidden() {
    let store = InMemoryStore::new();
    let app = app(&store, Uuid::new_v4());
    let bearer = format!("Bearer {}", token_for(Uuid::new_v4()));

    let response = app
        .oneshot(
            Request::delete(format!("/api/v1/settlements/{}", Uuid::new_v4()))
                .header(header::AUTHORIZATION, bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"]["code"], "PERMISSION_DENIED");
}
