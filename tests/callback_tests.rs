mod auth_support;

use std::sync::Arc;
use std::time::Duration;

use authkeep::auth::{
    CallbackHandler, CallbackOutcome, CallbackParams, CallbackReconciler, CodeExchange,
    FailureKind, PkceCodeExchange, PkceConfig, PkceFlow,
};
use authkeep::config::ClientConfig;
use authkeep::session::Phase;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{any, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::{api_path, auth_response_json, pair, Harness};

fn handler(harness: &Harness) -> CallbackHandler {
    let session = harness.session();
    let reconciler = CallbackReconciler::server_side(session.api().clone());
    CallbackHandler::new(
        reconciler,
        session,
        harness.navigator.clone(),
        harness.config.clone(),
    )
}

async fn forbid_all_requests(server: &MockServer) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn provider_error_wins_over_stray_tokens() {
    let (server, harness) = Harness::serve(None).await;
    forbid_all_requests(&server).await;

    let report = handler(&harness)
        .handle(
            "http://app.test/auth/callback?error=access_denied&error_description=Denied\
             #access_token=a&refresh_token=r",
        )
        .await;

    let failure = report.failure().expect("callback should fail");
    assert_eq!(failure.kind, FailureKind::Provider);
    assert_eq!(failure.message(), "Authentication failed: access_denied - Denied");
    assert_eq!(report.navigated_to, "/login");
    assert_eq!(harness.stored(), None);
}

#[tokio::test]
async fn authorization_code_is_exchanged_exactly_once() {
    let (server, harness) = Harness::serve(None).await;
    Mock::given(method("GET"))
        .and(path(api_path("/callback")))
        .and(query_param("code", "abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(auth_response_json("acc-1", "ref-1", "u-1", "ada@example.com")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let report = handler(&harness)
        .handle("http://app.test/auth/callback?code=abc123")
        .await;

    assert_eq!(report.outcome, CallbackOutcome::Tokens(pair("acc-1", "ref-1")));
    assert_eq!(report.navigated_to, "/dashboard");
    assert_eq!(harness.navigator.visits(), vec!["/dashboard".to_string()]);
    assert_eq!(harness.stored(), Some(pair("acc-1", "ref-1")));
}

#[tokio::test]
async fn rejected_code_reports_server_detail() {
    let (server, harness) = Harness::serve(None).await;
    Mock::given(method("GET"))
        .and(path(api_path("/callback")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Invalid code"})))
        .expect(1)
        .mount(&server)
        .await;

    let report = handler(&harness)
        .handle("http://app.test/auth/callback?code=stale")
        .await;

    let failure = report.failure().expect("callback should fail");
    assert_eq!(failure.kind, FailureKind::Exchange);
    assert_eq!(failure.message(), "Invalid code");
    assert_eq!(report.navigated_to, "/login");
    assert_eq!(harness.stored(), None);
}

#[tokio::test]
async fn direct_tokens_are_stored_without_server_calls() {
    let (server, harness) = Harness::serve(None).await;
    forbid_all_requests(&server).await;

    let report = handler(&harness)
        .handle("http://app.test/auth/callback#access_token=acc&refresh_token=ref&type=recovery")
        .await;

    assert_eq!(report.outcome, CallbackOutcome::Tokens(pair("acc", "ref")));
    assert_eq!(harness.stored(), Some(pair("acc", "ref")));
}

#[tokio::test]
async fn signup_is_provisioned_before_tokens_are_returned() {
    let (server, harness) = Harness::serve(None).await;
    Mock::given(method("GET"))
        .and(path(api_path("/callback")))
        .and(query_param("access_token", "acc"))
        .and(query_param("refresh_token", "ref"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(auth_response_json("acc", "ref", "u-9", "new@example.com")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let report = handler(&harness)
        .handle("http://app.test/auth/callback#access_token=acc&refresh_token=ref&type=signup")
        .await;

    assert_eq!(report.outcome, CallbackOutcome::Tokens(pair("acc", "ref")));
    assert_eq!(harness.stored(), Some(pair("acc", "ref")));
}

#[tokio::test]
async fn failed_provisioning_is_an_exchange_error() {
    let (server, harness) = Harness::serve(None).await;
    Mock::given(method("GET"))
        .and(path(api_path("/callback")))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "Profile creation failed"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let report = handler(&harness)
        .handle("http://app.test/auth/callback#access_token=acc&refresh_token=ref&type=signup")
        .await;

    let failure = report.failure().expect("callback should fail");
    assert_eq!(failure.kind, FailureKind::Exchange);
    assert_eq!(failure.message(), "Profile creation failed");
    assert_eq!(harness.stored(), None);
    assert_eq!(report.navigated_to, "/login");
}

#[tokio::test(start_paused = true)]
async fn failure_redirect_waits_for_the_grace_period() {
    let config = ClientConfig::new("http://127.0.0.1:9").with_redirect_delay(Duration::from_secs(3));
    let harness = Harness::with_config(config, None);
    let handler = handler(&harness);

    let started = tokio::time::Instant::now();
    let report = handler.handle("http://app.test/auth/callback").await;

    assert!(started.elapsed() >= Duration::from_secs(3));
    let failure = report.failure().expect("callback should fail");
    assert_eq!(failure.kind, FailureKind::MissingParameters);
    assert_eq!(failure.message(), "Missing authentication tokens");
    assert_eq!(harness.navigator.visits(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn unparseable_url_counts_as_missing_parameters() {
    let harness = Harness::new("http://127.0.0.1:9", None);
    let report = handler(&harness).handle("not a url").await;

    assert_eq!(
        report.failure().map(|failure| failure.kind),
        Some(FailureKind::MissingParameters)
    );
}

#[tokio::test]
async fn callback_does_not_change_visible_session_state() {
    let (server, harness) = Harness::serve(None).await;
    forbid_all_requests(&server).await;
    let session = harness.session();
    let handler = CallbackHandler::new(
        CallbackReconciler::server_side(session.api().clone()),
        session.clone(),
        harness.navigator.clone(),
        harness.config.clone(),
    );

    handler
        .handle("http://app.test/auth/callback#access_token=acc&refresh_token=ref")
        .await;

    assert_eq!(session.state().phase(), Phase::Uninitialized);
    assert!(!session.state().is_authenticated());
}

fn pkce_config(server: &MockServer) -> PkceConfig {
    PkceConfig::new(
        format!("{}/oauth/authorize", server.uri()),
        format!("{}/oauth/token", server.uri()),
        "client-1",
        "http://app.test/auth/callback",
    )
}

#[tokio::test]
async fn pkce_exchange_sends_verifier_to_provider() {
    let (server, harness) = Harness::serve(None).await;
    let flow = PkceFlow::new(pkce_config(&server));
    let pkce = flow.start().unwrap();
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .and(body_string_contains(
            format!("code_verifier={}", pkce.code_verifier).as_str(),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "pkce-acc", "refresh_token": "pkce-ref"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = harness.session().api().clone();
    let reconciler = CallbackReconciler::new(api, Arc::new(PkceCodeExchange::new(flow, pkce.clone())));
    let params = CallbackParams::from_url(&format!(
        "http://app.test/auth/callback?code=abc123&state={}",
        pkce.state
    ))
    .unwrap();

    let outcome = reconciler.reconcile(&params).await;
    assert_eq!(outcome, CallbackOutcome::Tokens(pair("pkce-acc", "pkce-ref")));
}

#[tokio::test]
async fn pkce_state_mismatch_never_reaches_provider() {
    let server = MockServer::start().await;
    forbid_all_requests(&server).await;
    let flow = PkceFlow::new(pkce_config(&server));
    let pkce = flow.start().unwrap();
    let exchange = PkceCodeExchange::new(flow, pkce);

    let err = exchange.exchange("abc123", Some("forged")).await.unwrap_err();
    assert!(err.to_string().contains("state mismatch"), "got {err}");
}
