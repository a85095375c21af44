// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end pipeline tests: the full router with middleware stack against
//! an in-memory store, driven through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use edon_core::bootstrap::build_state;
use edon_core::config::GatewayConfig;
use edon_core::infrastructure::db::Database;
use edon_core::presentation::api::build_router;

const TOKEN: &str = "test-token-123";

struct TestApp {
    router: Router,
    _sandbox: tempfile::TempDir,
}

async fn app_with(mutate: impl FnOnce(&mut GatewayConfig)) -> TestApp {
    let sandbox = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::default();
    config.api_token = TOKEN.to_string();
    config.rate_limit_enabled = false;
    config.email_sandbox_dir = sandbox.path().join("emails");
    config.filesystem_sandbox_dir = sandbox.path().join("filesystem");
    mutate(&mut config);

    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    let state = build_state(config, &db);
    TestApp {
        router: build_router(state),
        _sandbox: sandbox,
    }
}

async fn app() -> TestApp {
    app_with(|_| {}).await
}

async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("X-EDON-TOKEN", TOKEN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("X-EDON-TOKEN", TOKEN)
        .body(Body::empty())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_and_version_are_public() {
    let app = app().await;
    let (status, body) = send_json(
        &app.router,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send_json(
        &app.router,
        Request::builder().uri("/version").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_missing_and_invalid_tokens_are_401_with_same_shape() {
    let app = app().await;
    let (status, missing) = send_json(
        &app.router,
        Request::builder().uri("/intent/get").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, invalid) = send_json(
        &app.router,
        Request::builder()
            .uri("/intent/get")
            .header("X-EDON-TOKEN", "wrong")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Same body shape for both failures.
    assert!(missing["detail"].is_string());
    assert!(invalid["detail"].is_string());
}

#[tokio::test]
async fn test_bearer_fallback_accepted() {
    let app = app().await;
    let request = Request::builder()
        .uri("/policy-packs")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["packs"].as_array().unwrap().len(), 4);
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_intent_set_is_idempotent_upsert() {
    let app = app().await;
    let body = json!({
        "intent_id": "intent_fixed",
        "objective": "Read email",
        "scope": {"email": ["read"]},
        "approved_by_user": true
    });

    let (status, first) = send_json(&app.router, post("/intent/set", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["intent_id"], "intent_fixed");

    let (status, second) = send_json(&app.router, post("/intent/set", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["intent_id"], "intent_fixed");

    let (status, fetched) = send_json(&app.router, get("/intent/get?intent_id=intent_fixed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["objective"], "Read email");
}

#[tokio::test]
async fn test_intent_get_missing_is_404() {
    let app = app().await;
    let (status, _) = send_json(&app.router, get("/intent/get?intent_id=ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Execute: envelope and audit invariants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_execute_produces_exactly_one_audit_event_and_decision() {
    let app = app().await;
    send_json(
        &app.router,
        post(
            "/intent/set",
            json!({
                "intent_id": "intent_email",
                "objective": "Handle email",
                "scope": {"email": ["read", "send"]},
                "approved_by_user": true
            }),
        ),
    )
    .await;

    let (status, envelope) = send_json(
        &app.router,
        post(
            "/execute",
            json!({
                "action": {"tool": "email", "op": "read", "params": {"folder": "inbox"}},
                "intent_id": "intent_email",
                "agent_id": "agent-e2e"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["verdict"], "ALLOW");
    assert_eq!(envelope["reason_code"], "APPROVED");
    let decision_id = envelope["decision_id"].as_str().unwrap();
    assert!(decision_id.starts_with("dec-"));
    // ALLOW carries an execution block.
    assert!(envelope["execution"].is_object());

    let (status, audit) = send_json(&app.router, get("/audit/query?agent_id=agent-e2e")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["total"], 1);

    let (status, decision) =
        send_json(&app.router, get(&format!("/decisions/{decision_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["verdict"], "ALLOW");
}

#[tokio::test]
async fn test_critical_shell_command_blocks_with_risk_dominating() {
    let app = app().await;
    send_json(
        &app.router,
        post(
            "/intent/set",
            json!({
                "intent_id": "intent_email",
                "objective": "Handle email",
                "scope": {"email": ["read"]},
                "approved_by_user": true
            }),
        ),
    )
    .await;

    let (status, envelope) = send_json(
        &app.router,
        post(
            "/execute",
            json!({
                "action": {
                    "tool": "shell",
                    "op": "run",
                    "params": {"cmd": "rm -rf /"},
                    "estimated_risk": "low"
                },
                "intent_id": "intent_email",
                "agent_id": "agent-shell"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["verdict"], "BLOCK");
    assert_eq!(envelope["reason_code"], "RISK_TOO_HIGH");
    assert!(envelope.get("execution").is_none() || envelope["execution"].is_null());

    // The persisted audit event carries the server-computed risk.
    let (_, audit) = send_json(&app.router, get("/audit/query?agent_id=agent-shell")).await;
    assert_eq!(audit["events"][0]["action"]["computed_risk"], "critical");
    assert_eq!(audit["events"][0]["action"]["estimated_risk"], "low");
}

#[tokio::test]
async fn test_escalation_envelope_for_too_many_recipients() {
    let app = app().await;
    send_json(
        &app.router,
        post(
            "/intent/set",
            json!({
                "intent_id": "intent_send",
                "objective": "Send the newsletter",
                "scope": {"email": ["send"]},
                "constraints": {"max_recipients": 10},
                "approved_by_user": true
            }),
        ),
    )
    .await;

    let recipients: Vec<String> = (0..15).map(|i| format!("user{i}@example.com")).collect();
    let (status, envelope) = send_json(
        &app.router,
        post(
            "/execute",
            json!({
                "action": {"tool": "email", "op": "send", "params": {"recipients": recipients}},
                "intent_id": "intent_send",
                "agent_id": "agent-bulk"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["verdict"], "ESCALATE");
    assert_eq!(envelope["reason_code"], "NEED_CONFIRMATION");
    let options: Vec<&str> = envelope["escalation"]["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_str().unwrap())
        .collect();
    assert_eq!(options, vec!["allow_once", "draft_only", "keep_blocking"]);
    assert!(envelope.get("execution").is_none() || envelope["execution"].is_null());
}

// ---------------------------------------------------------------------------
// Policy packs + proxy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_out_of_scope_proxy_tool_blocks_without_downstream_contact() {
    let app = app().await;

    let (status, applied) = send_json(
        &app.router,
        post("/policy-packs/clawdbot_safe/apply", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let intent_id = applied["intent_id"].as_str().unwrap().to_string();
    assert!(!intent_id.is_empty());

    // No downstream credential exists. If the governor let this through, the
    // vault would 503; a BLOCK proves the downstream path was never entered.
    let (status, envelope) = send_json(
        &app.router,
        post(
            "/clawdbot/invoke",
            json!({"tool": "web_execute", "action": "json", "args": {}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["verdict"], "BLOCK");
    assert_eq!(envelope["reason_code"], "SCOPE_VIOLATION");
    assert!(envelope.get("execution").is_none() || envelope["execution"].is_null());
}

#[tokio::test]
async fn test_benign_proxy_call_roundtrip_through_stub_downstream() {
    let app = app().await;

    // Minimal downstream bot gateway: answers one request with ok+result.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 65536];
                let mut read = 0usize;
                // Read headers, then the content-length body.
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    let text = String::from_utf8_lossy(&buf[..read]);
                    if let Some(header_end) = text.find("\r\n\r\n") {
                        let content_length = text
                            .lines()
                            .find_map(|l| {
                                l.to_ascii_lowercase()
                                    .strip_prefix("content-length:")
                                    .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                            })
                            .unwrap_or(0);
                        if read >= header_end + 4 + content_length {
                            break;
                        }
                    }
                }
                let body = r#"{"ok": true, "result": {"sessions": []}}"#;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    // Store the downstream credential, then apply the proxy-safe pack.
    let (status, _) = send_json(
        &app.router,
        post(
            "/integrations/clawdbot/connect",
            json!({
                "base_url": format!("http://127.0.0.1:{}", addr.port()),
                "auth_mode": "token",
                "secret": "downstream-secret"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    send_json(
        &app.router,
        post("/policy-packs/clawdbot_safe/apply", json!({})),
    )
    .await;

    let (status, envelope) = send_json(
        &app.router,
        post(
            "/clawdbot/invoke",
            json!({"tool": "sessions_list", "action": "json", "args": {}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["verdict"], "ALLOW");
    assert_eq!(envelope["reason_code"], "APPROVED");
    assert_eq!(envelope["execution"]["tool"], "clawdbot");
    assert_eq!(envelope["execution"]["ok"], true);
    assert_eq!(envelope["execution"]["result"], json!({"sessions": []}));
}

// ---------------------------------------------------------------------------
// Credentials: strict mode and write-only surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_strict_credentials_missing_is_503() {
    let app = app_with(|config| {
        config.credentials_strict = true;
    })
    .await;

    send_json(
        &app.router,
        post("/policy-packs/clawdbot_safe/apply", json!({})),
    )
    .await;

    let (status, body) = send_json(
        &app.router,
        post(
            "/clawdbot/invoke",
            json!({"tool": "sessions_list", "action": "json", "args": {}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().contains("Credential missing"));
}

#[tokio::test]
async fn test_search_without_credential_fails_closed_via_execute() {
    let app = app().await;
    send_json(
        &app.router,
        post(
            "/intent/set",
            json!({
                "intent_id": "intent_search",
                "objective": "Research the market",
                "scope": {"brave_search": ["search"]},
                "approved_by_user": true
            }),
        ),
    )
    .await;

    // No search credential is stored and there is no env fallback for the
    // search tool, so the execution path must 503 before any network call.
    let (status, body) = send_json(
        &app.router,
        post(
            "/execute",
            json!({
                "action": {"tool": "brave_search", "op": "search", "params": {"q": "rust"}},
                "intent_id": "intent_search",
                "agent_id": "agent-search"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().contains("Credential missing"));

    // The decision itself was still reached and audited.
    let (_, audit) = send_json(&app.router, get("/audit/query?agent_id=agent-search")).await;
    assert_eq!(audit["total"], 1);
    assert_eq!(audit["events"][0]["verdict"], "ALLOW");
}

#[tokio::test]
async fn test_credential_payload_never_readable_over_http() {
    let app = app().await;
    let secret = "super-secret-gateway-token";

    send_json(
        &app.router,
        post(
            "/integrations/clawdbot/connect",
            json!({"base_url": "http://127.0.0.1:18789", "auth_mode": "token", "secret": secret}),
        ),
    )
    .await;

    // Sweep every readable surface for the secret.
    for path in [
        "/account/integrations",
        "/policy-packs",
        "/metrics",
        "/audit/query",
        "/decisions/query",
        "/intent/get?intent_id=none",
        "/health",
    ] {
        let response = app.router.clone().oneshot(get(path)).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        assert!(
            !text.contains(secret),
            "secret leaked through {path}: {text}"
        );
    }
}

#[tokio::test]
async fn test_integration_status_reflects_save_delete_resave() {
    let app = app().await;
    let connect_body = json!({
        "base_url": "http://127.0.0.1:18789",
        "auth_mode": "token",
        "secret": "s3cret",
        "probe": true
    });

    send_json(&app.router, post("/integrations/clawdbot/connect", connect_body.clone())).await;
    let (_, first) = send_json(&app.router, get("/account/integrations")).await;
    assert_eq!(first["clawdbot"]["connected"], true);

    let (status, _) = send_json(
        &app.router,
        Request::builder()
            .method("DELETE")
            .uri("/credentials/clawdbot_gateway")
            .header("X-EDON-TOKEN", TOKEN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, deleted) = send_json(&app.router, get("/account/integrations")).await;
    assert_eq!(deleted["clawdbot"]["connected"], false);

    send_json(&app.router, post("/integrations/clawdbot/connect", connect_body)).await;
    let (_, resaved) = send_json(&app.router, get("/account/integrations")).await;
    assert_eq!(resaved["clawdbot"]["connected"], true);
    assert_eq!(resaved["clawdbot"]["base_url"], "http://127.0.0.1:18789");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_script_payload_rejected_with_jsonpath() {
    let app = app().await;
    let (status, body) = send_json(
        &app.router,
        post(
            "/execute",
            json!({
                "action": {"tool": "email", "op": "send", "params": {"body": "<script>alert(1)</script>"}},
                "agent_id": "agent-x"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("Script tags not allowed"));
    assert!(detail.contains("action.params.body"));
}

#[tokio::test]
async fn test_deep_nesting_rejected() {
    let app = app().await;
    let mut nested = json!(1);
    for _ in 0..11 {
        nested = json!([nested]);
    }
    let (status, body) = send_json(
        &app.router,
        post("/plan", json!({"objective": "x", "extra": nested})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("depth"));
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let app = app().await;
    // 10 MiB of padding plus envelope overhead crosses the limit.
    let padding = "x".repeat(10 * 1024 * 1024);
    let (status, _) = send_json(
        &app.router,
        post("/plan", json!({"objective": padding})),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_invalid_json_body_is_400() {
    let app = app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/plan")
        .header("X-EDON-TOKEN", TOKEN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send_json(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rate_limited_response_carries_retry_after() {
    let app = app_with(|config| {
        config.rate_limit_enabled = true;
        config.rate_limit_per_minute = 2;
    })
    .await;

    let request = |agent: &str| {
        Request::builder()
            .method("GET")
            .uri("/policy-packs")
            .header("X-EDON-TOKEN", TOKEN)
            .header("X-Agent-ID", agent)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.router.clone().oneshot(request("agent-rl")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.router.clone().oneshot(request("agent-rl")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 60);

    // A different agent is unaffected.
    let response = app.router.clone().oneshot(request("agent-other")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Metrics / trust spec / plan
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_metrics_and_trust_spec() {
    let app = app_with(|config| {
        config.network_gating = false;
        config.token_hardening = true;
        config.credentials_strict = false;
    })
    .await;

    // Generate one decision so the counters move.
    send_json(
        &app.router,
        post(
            "/execute",
            json!({
                "action": {"tool": "email", "op": "read", "params": {}},
                "agent_id": "agent-m"
            }),
        ),
    )
    .await;

    let (status, metrics) = send_json(&app.router, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics["decisions"].as_array().unwrap().iter().any(|d| d["verdict"] == "ALLOW"));

    let response = app
        .router
        .clone()
        .oneshot(get("/metrics/prometheus"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("edon_decisions_total"));
    assert!(text.contains("edon_uptime_seconds"));

    let (status, spec) = send_json(&app.router, get("/benchmark/trust-spec")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(spec["bypass_resistance_score"]["score"], 40);
}

#[tokio::test]
async fn test_plan_is_non_executing() {
    let app = app().await;
    let (status, plan) = send_json(
        &app.router,
        post("/plan", json!({"objective": "search the web for rust news"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(plan["count"].as_u64().unwrap() >= 1);
    assert_eq!(plan["steps"][0]["tool"], "brave_search");

    // Planning produced no audit events.
    let (_, audit) = send_json(&app.router, get("/audit/query")).await;
    assert_eq!(audit["total"], 0);
}

// ---------------------------------------------------------------------------
// Response hygiene
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_error_bodies_carry_no_internal_details() {
    let app = app().await;
    let probes = vec![
        Request::builder().uri("/intent/get?intent_id=ghost").header("X-EDON-TOKEN", TOKEN).body(Body::empty()).unwrap(),
        Request::builder().uri("/decisions/ghost").header("X-EDON-TOKEN", TOKEN).body(Body::empty()).unwrap(),
        Request::builder().uri("/audit/query?limit=5000").header("X-EDON-TOKEN", TOKEN).body(Body::empty()).unwrap(),
        Request::builder().uri("/intent/get").body(Body::empty()).unwrap(),
    ];
    for request in probes {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        for marker in ["Traceback", "/home/", "/Users/", "C:\\", ".rs"] {
            assert!(!text.contains(marker), "marker {marker} leaked: {text}");
        }
    }
}

#[tokio::test]
async fn test_loop_detection_end_to_end() {
    let app = app().await;
    send_json(
        &app.router,
        post(
            "/intent/set",
            json!({
                "intent_id": "intent_loop",
                "objective": "Read email",
                "scope": {"email": ["read"]},
                "approved_by_user": true
            }),
        ),
    )
    .await;

    let call = || {
        post(
            "/execute",
            json!({
                "action": {"tool": "email", "op": "read", "params": {"folder": "inbox"}},
                "intent_id": "intent_loop",
                "agent_id": "agent-loop"
            }),
        )
    };

    for i in 0..5 {
        let (_, envelope) = send_json(&app.router, call()).await;
        assert_eq!(envelope["verdict"], "ALLOW", "call {i}");
    }
    let (_, sixth) = send_json(&app.router, call()).await;
    assert_eq!(sixth["verdict"], "PAUSE");
    assert_eq!(sixth["reason_code"], "LOOP_DETECTED");
}
