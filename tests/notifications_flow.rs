mod common;

use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::http::StatusCode;
use chrono::{DateTime, FixedOffset};
use common::{acquire_db_lock, expect_json, id_of, Marketplace, TestApp};
use serde_json::{json, Value};

async fn inbox(app: &TestApp, token: &str, query: &str) -> Result<Vec<Value>> {
    let body = expect_json(
        app.get(&format!("/api/me/notifications{query}"), Some(token))
            .await?,
        StatusCode::OK,
    )
    .await?;
    Ok(body["items"].as_array().cloned().unwrap_or_default())
}

fn of_type<'a>(items: &'a [Value], kind: &str) -> Result<&'a Value> {
    items
        .iter()
        .find(|item| item["type"] == kind)
        .ok_or_else(|| anyhow!("no {kind} notification in {items:?}"))
}

#[tokio::test]
async fn submit_notifies_owner_without_contact() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let market = Marketplace::seed(&app).await?;
    let application_id = market.apply(&app).await?;

    let owner = inbox(&app, &market.recruiter_token, "").await?;
    assert_eq!(owner.len(), 1);
    let new = of_type(&owner, "application:new")?;
    assert_eq!(new["application_id"], application_id.as_str());
    assert_eq!(new["job_id"], market.job_id.as_str());
    assert_eq!(new["message"], "Ada Lovelace applied to Rust Engineer.");
    assert_eq!(new["is_read"], false);
    assert!(new["contact_email"].is_null());
    assert!(new["contact_role"].is_null());

    let candidate = inbox(&app, &market.candidate_token, "").await?;
    assert!(candidate.is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn match_discloses_each_party_to_the_other() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let market = Marketplace::seed(&app).await?;
    let application_id = market.apply(&app).await?;

    expect_json(
        app.post_json(
            &format!("/api/company/applications/{application_id}/match"),
            &json!({}),
            Some(&market.recruiter_token),
        )
        .await?,
        StatusCode::OK,
    )
    .await?;

    let candidate = inbox(&app, &market.candidate_token, "").await?;
    assert_eq!(candidate.len(), 1);
    let accepted = of_type(&candidate, "application:matched")?;
    assert_eq!(accepted["contact_role"], "company");
    assert_eq!(accepted["contact_email"], "r@corp.com");
    assert_eq!(accepted["contact_name"], "Corp");

    let owner = inbox(&app, &market.recruiter_token, "").await?;
    assert_eq!(owner.len(), 2);
    let matched = of_type(&owner, "application:matched")?;
    assert_eq!(matched["contact_role"], "candidate");
    assert_eq!(matched["contact_email"], "a@x.com");
    assert_eq!(matched["contact_name"], "Ada Lovelace");

    // The earlier submit notification never gains a contact.
    let new = of_type(&owner, "application:new")?;
    assert!(new["contact_email"].is_null());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn marking_read_is_scoped_to_the_recipient() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let market = Marketplace::seed(&app).await?;
    market.apply(&app).await?;

    let owner = inbox(&app, &market.recruiter_token, "").await?;
    let notification_id = id_of(of_type(&owner, "application:new")?)?;
    let path = format!("/api/me/notifications/{notification_id}/read");

    let foreign = app
        .post_json(&path, &json!({}), Some(&market.candidate_token))
        .await?;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

    let still_unread = inbox(&app, &market.recruiter_token, "?only_unread=true").await?;
    assert_eq!(still_unread.len(), 1);

    let marked = expect_json(
        app.post_json(&path, &json!({}), Some(&market.recruiter_token))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(marked, json!({ "ok": true }));

    let read_at = |items: &[Value]| -> Result<DateTime<FixedOffset>> {
        let raw = items[0]["read_at"]
            .as_str()
            .ok_or_else(|| anyhow!("read_at missing in {items:?}"))?;
        Ok(DateTime::parse_from_rfc3339(raw)?)
    };
    let first = read_at(&inbox(&app, &market.recruiter_token, "").await?)?;

    // Marking again succeeds and restamps read_at.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let again = app
        .post_json(&path, &json!({}), Some(&market.recruiter_token))
        .await?;
    assert_eq!(again.status(), StatusCode::OK);

    let unread = inbox(&app, &market.recruiter_token, "?only_unread=true").await?;
    assert!(unread.is_empty());
    let all = inbox(&app, &market.recruiter_token, "").await?;
    assert_eq!(all[0]["is_read"], true);
    assert!(read_at(&all)? > first);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unread_filter_accepts_common_flag_spellings() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let market = Marketplace::seed(&app).await?;
    market.apply(&app).await?;

    for query in ["?only_unread=1", "?only_unread=yes", "?only_unread=On"] {
        let unread = inbox(&app, &market.recruiter_token, query).await?;
        assert_eq!(unread.len(), 1, "{query}");
    }

    expect_json(
        app.post_json("/api/me/notifications/read-all", &json!({}), Some(&market.recruiter_token))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert!(inbox(&app, &market.recruiter_token, "?only_unread=1").await?.is_empty());
    assert_eq!(inbox(&app, &market.recruiter_token, "?only_unread=0").await?.len(), 1);
    assert_eq!(inbox(&app, &market.recruiter_token, "?only_unread=no").await?.len(), 1);

    let garbled = app
        .get("/api/me/notifications?only_unread=maybe", Some(&market.recruiter_token))
        .await?;
    assert_eq!(garbled.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn read_all_only_touches_own_unread() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let market = Marketplace::seed(&app).await?;
    let application_id = market.apply(&app).await?;
    expect_json(
        app.post_json(
            &format!("/api/company/applications/{application_id}/match"),
            &json!({}),
            Some(&market.recruiter_token),
        )
        .await?,
        StatusCode::OK,
    )
    .await?;

    let limited = inbox(&app, &market.recruiter_token, "?limit=1").await?;
    assert_eq!(limited.len(), 1);

    let marked = expect_json(
        app.post_json(
            "/api/me/notifications/read-all",
            &json!({}),
            Some(&market.recruiter_token),
        )
        .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(marked["ok"], true);
    assert_eq!(marked["updated"], 2);

    let unread = inbox(&app, &market.recruiter_token, "?only_unread=true").await?;
    assert!(unread.is_empty());

    let candidate_unread = inbox(&app, &market.candidate_token, "?only_unread=true").await?;
    assert_eq!(candidate_unread.len(), 1);

    let repeat = expect_json(
        app.post_json(
            "/api/me/notifications/read-all",
            &json!({}),
            Some(&market.recruiter_token),
        )
        .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(repeat["updated"], 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn notifications_require_authentication() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let anonymous = app.get("/api/me/notifications", None).await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}
