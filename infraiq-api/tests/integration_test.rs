/// Integration tests for the InfraIQ API
///
/// The first group runs against [`TestContext::offline`] and covers
/// everything decided before the database is touched: authentication,
/// request validation, webhook signatures and static endpoints.
///
/// Tests marked `#[ignore]` need PostgreSQL (`DATABASE_URL`):
///
/// ```bash
/// DATABASE_URL=postgres://... cargo test -p infraiq-api -- --ignored
/// ```

mod common;

use axum::http::{header, Method, StatusCode};
use chrono::Utc;
use common::{
    json_request, raw_request, request, TestContext, CLERK_WEBHOOK_SECRET, INTERNAL_API_KEY,
    INTERNAL_SERVICE_KEY, STRIPE_WEBHOOK_SECRET,
};
use infraiq_shared::models::user::User;
use infraiq_shared::webhooks::{stripe as stripe_signature, svix};
use serde_json::json;
use tower::ServiceExt;

fn scan_payload(tool: &str) -> serde_json::Value {
    json!({
        "tool": tool,
        "provider": "aws",
        "region": "us-east-1",
        "summary": {
            "resources_scanned": 12,
            "issues_found": 3,
            "critical": 1,
            "high": 1,
            "medium": 1,
            "low": 0
        },
        "findings": []
    })
}

fn clerk_headers(body: &[u8], timestamp: i64) -> Vec<(String, String)> {
    let signature = svix::sign(body, CLERK_WEBHOOK_SECRET, "msg_test", timestamp).unwrap();
    vec![
        (svix::ID_HEADER.to_string(), "msg_test".to_string()),
        (svix::TIMESTAMP_HEADER.to_string(), timestamp.to_string()),
        (svix::SIGNATURE_HEADER.to_string(), signature),
    ]
}

fn as_refs(headers: &[(String, String)]) -> Vec<(&str, &str)> {
    headers
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Public endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_degraded_database() {
    let ctx = TestContext::offline();

    let res = ctx.send(request(Method::GET, "/health", &[])).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "degraded");
    assert_eq!(res.body["database"], "disconnected");
    assert_eq!(res.body["environment"], "test");
}

#[tokio::test]
async fn test_sync_status_is_public() {
    let ctx = TestContext::offline();

    let res = ctx.send(request(Method::GET, "/api/sync/status", &[])).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok");
    assert_eq!(res.body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_prices_are_public() {
    let ctx = TestContext::offline();

    let res = ctx.send(request(Method::GET, "/api/checkout/prices", &[])).await;

    assert_eq!(res.status, StatusCode::OK);
    let keys: Vec<&str> = res.body["prices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["pro_monthly", "team_monthly", "enterprise"]);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let ctx = TestContext::offline();

    let res = ctx.send(request(Method::GET, "/api/scans", &[])).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(res.headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(res.headers[header::CACHE_CONTROL], "no-store");
    assert!(!res.headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
}

#[tokio::test]
async fn test_hsts_in_production() {
    let ctx = TestContext::offline_with(&[("ENVIRONMENT", "production")]);

    let res = ctx.send(request(Method::GET, "/api/sync/status", &[])).await;

    assert_eq!(
        res.headers[header::STRICT_TRANSPORT_SECURITY],
        "max-age=31536000; includeSubDomains"
    );
}

#[tokio::test]
async fn test_cors_preflight_for_dashboard_origin() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(request(
            Method::OPTIONS,
            "/api/scans",
            &[
                ("origin", "http://localhost:3000"),
                ("access-control-request-method", "POST"),
                ("access-control-request-headers", "x-api-key"),
            ],
        ))
        .await;

    assert!(res.status.is_success());
    assert_eq!(
        res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let ctx = TestContext::offline();

    let res = ctx.send(request(Method::GET, "/api/projects", &[])).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "unauthorized");
}

#[tokio::test]
async fn test_malformed_api_key_rejected() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(request(Method::GET, "/api/scans", &[("x-api-key", "not-a-key")]))
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_internal_key_rejected() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(request(Method::GET, "/api/scans", &[("x-internal-key", "wrong")]))
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_authorization_rejected() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(request(
            Method::GET,
            "/api/scans",
            &[("authorization", "Basic dXNlcjpwYXNz")],
        ))
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_internal_key_wins_over_personal_key() {
    let ctx = TestContext::offline();

    // Rejected by query validation, which runs after authentication
    let res = ctx
        .send(request(
            Method::GET,
            "/api/scans?tool=terraform",
            &[
                ("x-internal-key", INTERNAL_API_KEY),
                ("x-api-key", "iq_unknown"),
            ],
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Invalid tool: terraform");
}

#[tokio::test]
async fn test_internal_key_accepted_as_api_key() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(request(
            Method::GET,
            "/api/scans?limit=500",
            &[("x-api-key", INTERNAL_API_KEY)],
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_service_endpoints_require_service_key() {
    let ctx = TestContext::offline();
    let body = json!({"email": "ada@example.com", "license_key": "LIC-1", "tier": "platinum"});

    // The dashboard key is not the service key
    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/license/license-update",
            &[("x-internal-key", INTERNAL_API_KEY)],
            &body,
        ))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/license/license-update",
            &[("x-internal-key", INTERNAL_SERVICE_KEY)],
            &body,
        ))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Invalid tier: platinum");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_project_name_validated() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/projects",
            &[("x-internal-key", INTERNAL_API_KEY)],
            &json!({"name": ""}),
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "validation_error");
    assert_eq!(res.body["details"][0]["field"], "name");
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(raw_request(
            Method::POST,
            "/api/scans",
            &[("x-internal-key", INTERNAL_API_KEY)],
            b"{not json".to_vec(),
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "bad_request");
}

#[tokio::test]
async fn test_checkout_rejects_unknown_price_key() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/checkout/create-session",
            &[("x-internal-key", INTERNAL_API_KEY)],
            &json!({
                "price_key": "gold_yearly",
                "customer_email": "buyer@example.com",
                "clerk_id": "user_1"
            }),
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.body["message"],
        "Invalid price_key. Must be one of: pro_monthly, team_monthly"
    );
}

#[tokio::test]
async fn test_checkout_for_another_user_forbidden() {
    let ctx = TestContext::offline_with(&[("ENVIRONMENT", "development")]);

    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/checkout/create-session",
            &[("authorization", "Bearer test_user_a")],
            &json!({
                "price_key": "pro_monthly",
                "customer_email": "buyer@example.com",
                "clerk_id": "user_b"
            }),
        ))
        .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sync_requires_credentials() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(json_request(Method::POST, "/api/sync", &[], &scan_payload("verify")))
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_authenticates_before_reading_body() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(raw_request(Method::POST, "/api/sync", &[], b"{not json".to_vec()))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = ctx
        .send(raw_request(
            Method::POST,
            "/api/sync",
            &[("x-internal-key", INTERNAL_API_KEY)],
            b"{not json".to_vec(),
        ))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "bad_request");
}

#[tokio::test]
async fn test_sync_accepts_timestamp_without_offset() {
    let ctx = TestContext::offline();
    let mut payload = scan_payload("terraform");
    payload["timestamp"] = json!("2026-01-05T10:00:00.123456");

    // Past deserialization, the unknown tool is what gets reported
    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/sync",
            &[("x-internal-key", INTERNAL_API_KEY)],
            &payload,
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Invalid tool: terraform");
}

#[tokio::test]
async fn test_responses_are_gzip_compressed_on_request() {
    let ctx = TestContext::offline();

    let response = ctx
        .app
        .clone()
        .oneshot(request(
            Method::GET,
            "/api/checkout/prices",
            &[("accept-encoding", "gzip")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
}

#[tokio::test]
async fn test_sync_rejects_unknown_tool() {
    let ctx = TestContext::offline();

    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/sync",
            &[("x-internal-key", INTERNAL_API_KEY)],
            &scan_payload("terraform"),
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Invalid tool: terraform");
}

// ---------------------------------------------------------------------------
// Webhook signatures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_clerk_webhook_missing_headers() {
    let ctx = TestContext::offline();
    let body = br#"{"type":"session.created","data":{}}"#.to_vec();

    let res = ctx
        .send(raw_request(Method::POST, "/webhooks/clerk", &[], body))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clerk_webhook_tampered_body() {
    let ctx = TestContext::offline();
    let signed = br#"{"type":"session.created","data":{}}"#;
    let headers = clerk_headers(signed, Utc::now().timestamp());

    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/clerk",
            &as_refs(&headers),
            br#"{"type":"user.deleted","data":{"id":"user_1"}}"#.to_vec(),
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clerk_webhook_stale_timestamp() {
    let ctx = TestContext::offline();
    let body = br#"{"type":"session.created","data":{}}"#;
    let headers = clerk_headers(body, Utc::now().timestamp() - 3600);

    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/clerk",
            &as_refs(&headers),
            body.to_vec(),
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clerk_webhook_unhandled_event_acknowledged() {
    let ctx = TestContext::offline();
    let body = br#"{"type":"session.created","data":{"id":"sess_1"}}"#;
    let headers = clerk_headers(body, Utc::now().timestamp());

    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/clerk",
            &as_refs(&headers),
            body.to_vec(),
        ))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({"received": true}));
}

#[tokio::test]
async fn test_clerk_webhook_user_without_email_skipped() {
    let ctx = TestContext::offline();
    let body = br#"{"type":"user.created","data":{"id":"user_1","email_addresses":[]}}"#;
    let headers = clerk_headers(body, Utc::now().timestamp());

    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/clerk",
            &as_refs(&headers),
            body.to_vec(),
        ))
        .await;

    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_stripe_webhook_signatures() {
    let ctx = TestContext::offline();
    let body = br#"{"id":"evt_1","type":"payment_intent.created","data":{"object":{}}}"#;
    let now = Utc::now().timestamp();

    let res = ctx
        .send(raw_request(Method::POST, "/webhooks/stripe", &[], body.to_vec()))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let forged = stripe_signature::sign(body, "whsec_other", now);
    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/stripe",
            &[(stripe_signature::SIGNATURE_HEADER, forged.as_str())],
            body.to_vec(),
        ))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let signature = stripe_signature::sign(body, STRIPE_WEBHOOK_SECRET, now);
    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/stripe",
            &[(stripe_signature::SIGNATURE_HEADER, signature.as_str())],
            body.to_vec(),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["received"], true);
}

#[tokio::test]
async fn test_stripe_webhook_invalid_json_after_signature() {
    let ctx = TestContext::offline();
    let body = b"not json";
    let signature = stripe_signature::sign(body, STRIPE_WEBHOOK_SECRET, Utc::now().timestamp());

    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/stripe",
            &[(stripe_signature::SIGNATURE_HEADER, signature.as_str())],
            body.to_vec(),
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsigned_webhooks_only_in_development() {
    let body = br#"{"id":"evt_1","type":"payment_intent.created","data":{"object":{}}}"#;

    let dev = TestContext::offline_with(&[
        ("ENVIRONMENT", "development"),
        ("STRIPE_WEBHOOK_SECRET", ""),
    ]);
    let res = dev
        .send(raw_request(Method::POST, "/webhooks/stripe", &[], body.to_vec()))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let prod = TestContext::offline_with(&[
        ("ENVIRONMENT", "production"),
        ("STRIPE_WEBHOOK_SECRET", ""),
    ]);
    let res = prod
        .send(raw_request(Method::POST, "/webhooks/stripe", &[], body.to_vec()))
        .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
}

// ---------------------------------------------------------------------------
// Database-backed flows
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn test_project_and_scan_lifecycle() {
    let ctx = TestContext::with_database().await.unwrap();
    let key = ctx.api_key().to_string();
    let auth = [("x-api-key", key.as_str())];

    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/projects",
            &auth,
            &json!({"name": "Production", "description": "Main account"}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let project_id = res.body["id"].as_str().unwrap().to_string();

    let mut payload = scan_payload("verify");
    payload["project_id"] = json!(project_id);
    let res = ctx
        .send(json_request(Method::POST, "/api/scans", &auth, &payload))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["user_id"], ctx.user().clerk_id.as_str());
    let scan_id = res.body["id"].as_str().unwrap().to_string();

    let res = ctx
        .send(request(Method::GET, &format!("/api/projects/{}", project_id), &auth))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["scans"], json!([scan_id]));

    let res = ctx
        .send(request(Method::GET, "/api/scans?tool=verify", &auth))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["total"], 1);

    let res = ctx
        .send(request(Method::GET, "/api/dashboard/stats", &auth))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["resources_monitored"], 12);
    assert_eq!(res.body["scans_this_week"], 1);

    let res = ctx
        .send(request(Method::DELETE, &format!("/api/projects/{}", project_id), &auth))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    // The scan survives its project
    let res = ctx
        .send(request(Method::GET, &format!("/api/scans/{}", scan_id), &auth))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["project_id"].is_null());

    let res = ctx
        .send(request(Method::DELETE, &format!("/api/scans/{}", scan_id), &auth))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = ctx
        .send(request(Method::GET, &format!("/api/scans/{}", scan_id), &auth))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_scan_in_foreign_project_not_found() {
    let ctx = TestContext::with_database().await.unwrap();
    let key = ctx.api_key().to_string();

    let mut payload = scan_payload("comply");
    payload["project_id"] = json!(uuid::Uuid::new_v4());
    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/scans",
            &[("x-api-key", key.as_str())],
            &payload,
        ))
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_current_user_and_trial() {
    let ctx = TestContext::with_database().await.unwrap();
    let key = ctx.api_key().to_string();

    let res = ctx
        .send(request(Method::GET, "/api/users/me", &[("x-api-key", key.as_str())]))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["tier"], "trial");
    assert_eq!(res.body["is_trial_active"], true);
    assert_eq!(res.body["trial_days_remaining"], 29);

    let res = ctx
        .send(request(
            Method::GET,
            "/api/users/me?clerk_id=user_someone_else",
            &[("x-api-key", key.as_str())],
        ))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_license_update_from_service() {
    let ctx = TestContext::with_database().await.unwrap();
    let email = ctx.user().email.clone();

    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/license/license-update",
            &[("x-internal-key", INTERNAL_SERVICE_KEY)],
            &json!({"email": email, "license_key": "LIC-TEST", "tier": "team"}),
        ))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "updated");
    assert_eq!(res.body["previous_tier"], "trial");

    let user = User::find_by_email(&ctx.db, &email).await.unwrap().unwrap();
    assert_eq!(user.tier, "team");
    assert!(user.trial_ends_at.is_none());

    let res = ctx
        .send(json_request(
            Method::POST,
            "/api/license/license-update",
            &[("x-internal-key", INTERNAL_SERVICE_KEY)],
            &json!({"email": "nobody@example.com", "license_key": "LIC-X", "tier": "pro"}),
        ))
        .await;
    assert_eq!(res.body["status"], "pending");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_clerk_user_lifecycle_webhooks() {
    let ctx = TestContext::with_database().await.unwrap();
    let clerk_id = format!("user_{}", uuid::Uuid::new_v4().simple());
    let email = format!("{}@example.com", clerk_id);

    let created = json!({
        "type": "user.created",
        "data": {
            "id": clerk_id,
            "email_addresses": [{"id": "idn_1", "email_address": email}],
            "primary_email_address_id": "idn_1",
            "first_name": "Ada",
            "last_name": "Lovelace"
        }
    })
    .to_string();
    let headers = clerk_headers(created.as_bytes(), Utc::now().timestamp());
    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/clerk",
            &as_refs(&headers),
            created.into_bytes(),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let user = User::find_by_clerk_id(&ctx.db, &clerk_id).await.unwrap().unwrap();
    assert_eq!(user.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(user.tier, "trial");
    assert!(user.api_key.unwrap().starts_with("iq_"));

    let deleted = json!({"type": "user.deleted", "data": {"id": clerk_id, "deleted": true}}).to_string();
    let headers = clerk_headers(deleted.as_bytes(), Utc::now().timestamp());
    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/clerk",
            &as_refs(&headers),
            deleted.into_bytes(),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(User::find_by_clerk_id(&ctx.db, &clerk_id).await.unwrap().is_none());

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_stripe_checkout_and_cancellation() {
    let ctx = TestContext::with_database().await.unwrap();
    let clerk_id = ctx.user().clerk_id.clone();
    let subscription_id = format!("sub_{}", uuid::Uuid::new_v4().simple());

    let completed = json!({
        "id": "evt_checkout",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_test",
            "customer": "cus_test",
            "subscription": subscription_id,
            "metadata": {"clerk_id": clerk_id, "tier": "pro"}
        }}
    })
    .to_string();
    let signature =
        stripe_signature::sign(completed.as_bytes(), STRIPE_WEBHOOK_SECRET, Utc::now().timestamp());
    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/stripe",
            &[(stripe_signature::SIGNATURE_HEADER, signature.as_str())],
            completed.into_bytes(),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let user = User::find_by_clerk_id(&ctx.db, &clerk_id).await.unwrap().unwrap();
    assert_eq!(user.tier, "pro");
    assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_test"));
    assert_eq!(user.stripe_subscription_id.as_deref(), Some(subscription_id.as_str()));

    let cancelled = json!({
        "id": "evt_cancel",
        "type": "customer.subscription.deleted",
        "data": {"object": {"id": subscription_id, "status": "canceled", "customer": "cus_test"}}
    })
    .to_string();
    let signature =
        stripe_signature::sign(cancelled.as_bytes(), STRIPE_WEBHOOK_SECRET, Utc::now().timestamp());
    let res = ctx
        .send(raw_request(
            Method::POST,
            "/webhooks/stripe",
            &[(stripe_signature::SIGNATURE_HEADER, signature.as_str())],
            cancelled.into_bytes(),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let user = User::find_by_clerk_id(&ctx.db, &clerk_id).await.unwrap().unwrap();
    assert_eq!(user.tier, "trial");
    assert!(user.stripe_subscription_id.is_none());

    ctx.cleanup().await.unwrap();
}
