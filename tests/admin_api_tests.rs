mod auth_support;

use authkeep::api::{AdminApi, AdminUserUpdate, ListUsersQuery, Tier};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use auth_support::{api_path, pair, profile_json, Harness};

#[tokio::test]
async fn list_users_forwards_filters() {
    let (server, harness) = Harness::serve(Some(pair("admin-acc", "admin-ref"))).await;
    Mock::given(method("GET"))
        .and(path(api_path("/admin/users")))
        .and(header("authorization", "Bearer admin-acc"))
        .and(query_param("tier", "enterprise"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [profile_json("u-1", "ada@example.com")],
            "total": 26,
            "page": 2,
            "limit": 25
        })))
        .expect(1)
        .mount(&server)
        .await;

    let admin = AdminApi::new(harness.gateway.clone());
    let page = admin
        .list_users(&ListUsersQuery {
            tier: Some(Tier::Enterprise),
            page: Some(2),
            limit: Some(25),
        })
        .await
        .unwrap();

    assert_eq!(page.total, 26);
    assert_eq!(page.users.len(), 1);
    assert_eq!(page.users[0].email, "ada@example.com");
}

#[tokio::test]
async fn update_user_sends_only_set_fields() {
    let (server, harness) = Harness::serve(Some(pair("admin-acc", "admin-ref"))).await;
    let mut updated = profile_json("u-7", "grace@example.com");
    updated["tier"] = json!("basic");
    Mock::given(method("PATCH"))
        .and(path(api_path("/admin/users/u-7")))
        .and(body_json(json!({"tier": "basic"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
        .expect(1)
        .mount(&server)
        .await;

    let admin = AdminApi::new(harness.gateway.clone());
    let profile = admin
        .update_user("u-7", &AdminUserUpdate::builder().tier(Tier::Basic).build())
        .await
        .unwrap();

    assert_eq!(profile.tier, Tier::Basic);
}

#[tokio::test]
async fn get_user_reports_forbidden() {
    let (server, harness) = Harness::serve(Some(pair("acc", "ref"))).await;
    Mock::given(method("GET"))
        .and(path(api_path("/admin/users/u-1")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Admin access required"})))
        .expect(1)
        .mount(&server)
        .await;

    let admin = AdminApi::new(harness.gateway.clone());
    let err = admin.get_user("u-1").await.unwrap_err();

    assert_eq!(err.to_string(), "API error (status 403): Admin access required");
}
