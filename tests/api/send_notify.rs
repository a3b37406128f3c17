use std::time::Duration;

use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use signup_notifier::registry::ExpiryMode;
use signup_notifier::registry::RegistrationStore;
use wiremock::matchers::any;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::spawn_app;
use crate::helpers::spawn_app_with;
use crate::helpers::TestApp;
use crate::helpers::BOT_TOKEN;

async fn mount_telegram_ok(app: &TestApp) {
    Mock::given(method("POST"))
        .and(path(format!("/bot{BOT_TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .mount(&app.telegram_server)
        .await;
}

async fn mount_geo_tashkent(app: &TestApp) {
    Mock::given(method("GET"))
        .and(path("/203.0.113.7/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ip": "203.0.113.7",
            "city": "Tashkent",
            "country_name": "Uzbekistan",
            "country_code": "UZ",
            "timezone": "Asia/Tashkent",
        })))
        .mount(&app.geo_server)
        .await;
}

async fn error_message(resp: reqwest::Response) -> String {
    let body: serde_json::Value = resp.json().await.unwrap();
    body["error"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn signup_once_then_duplicate() {
    let app = spawn_app().await;
    mount_telegram_ok(&app).await;

    let resp = app.post_notify(r#"{"email":"a@example.com"}"#).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "success": true }));

    let resp = app.post_notify(r#"{"email":"a@example.com"}"#).await;
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(error_message(resp).await, "This email is already registered.");

    // only the first signup is announced
    assert_eq!(app.telegram_messages().await.len(), 1);
}

#[tokio::test]
async fn distinct_emails_all_succeed() {
    let app = spawn_app().await;
    mount_telegram_ok(&app).await;

    for _ in 0..5 {
        let email: String = SafeEmail().fake();
        // `fake` may repeat itself
        let expected = match app.store.is_registered(&email).await.unwrap() {
            true => 400,
            false => 200,
        };
        assert_eq!(app.signup(&email).await.status().as_u16(), expected, "{email}");
    }
}

#[tokio::test]
async fn missing_telegram_config_changes_nothing() {
    let app = spawn_app_with(|cfg| {
        cfg.telegram.bot_token = None;
        cfg.telegram.chat_id = None;
    })
    .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.telegram_server)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.geo_server)
        .await;

    for _ in 0..2 {
        let resp = app.signup("a@example.com").await;
        assert_eq!(resp.status().as_u16(), 500);
        assert_eq!(error_message(resp).await, "Missing Telegram configuration");
    }
    assert!(app.store.is_empty());

    // once credentials are back, the same email can still register
    let restored = app.spawn_sibling(|_| {}).await;
    mount_telegram_ok(&restored).await;
    assert_eq!(restored.signup("a@example.com").await.status().as_u16(), 200);
}

#[tokio::test]
async fn either_credential_missing_is_a_config_error() {
    for unset in ["bot_token", "chat_id"] {
        let app = spawn_app_with(|cfg| match unset {
            "bot_token" => cfg.telegram.bot_token = None,
            _ => cfg.telegram.chat_id = Some(String::new()),
        })
        .await;
        let resp = app.signup("a@example.com").await;
        assert_eq!(resp.status().as_u16(), 500, "{unset}");
        assert_eq!(error_message(resp).await, "Missing Telegram configuration");
    }
}

#[tokio::test]
async fn malformed_body_is_a_generic_error() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.telegram_server)
        .await;

    for (body, msg) in [
        ("", "empty"),
        ("not json", "not json"),
        (r#"{"email":"a@example.com""#, "truncated"),
        ("{}", "no email"),
        (r#"{"email":42}"#, "email not a string"),
        (r#"["a@example.com"]"#, "array"),
    ] {
        let resp = app.post_notify(body).await;
        assert_eq!(resp.status().as_u16(), 500, "{msg}");
        assert_eq!(error_message(resp).await, "Failed to process request", "{msg}");
    }
    assert!(app.store.is_empty());
}

fn body_of_len(len: usize) -> String {
    // `{"email":"` + local part + `@example.com"}`
    let local = "a".repeat(len - r#"{"email":"@example.com"}"#.len());
    let body = format!(r#"{{"email":"{local}@example.com"}}"#);
    assert_eq!(body.len(), len);
    body
}

#[tokio::test]
async fn oversized_body_is_a_generic_error() {
    let app = spawn_app_with(|cfg| cfg.application.max_body_bytes = 1024).await;
    mount_telegram_ok(&app).await;

    let resp = app.post_notify(body_of_len(2048)).await;
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(error_message(resp).await, "Failed to process request");
    assert!(app.store.is_empty());
    assert!(app.telegram_messages().await.is_empty());

    // the limit is inclusive
    let resp = app.post_notify(body_of_len(1024)).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn oversized_body_without_credentials_is_a_config_error() {
    let app = spawn_app_with(|cfg| {
        cfg.application.max_body_bytes = 1024;
        cfg.telegram.bot_token = None;
    })
    .await;

    let resp = app.post_notify(body_of_len(2048)).await;
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(error_message(resp).await, "Missing Telegram configuration");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn notification_carries_location_and_client() {
    let app = spawn_app().await;
    mount_geo_tashkent(&app).await;
    mount_telegram_ok(&app).await;

    assert_eq!(app.signup("a@example.com").await.status().as_u16(), 200);

    let messages = app.telegram_messages().await;
    assert_eq!(messages.len(), 1);
    let msg = &messages[0];
    assert!(msg.contains("<b>Email:</b> a@example.com"), "{msg}");
    assert!(msg.contains("<b>Country:</b> Uzbekistan 🇺🇿"), "{msg}");
    assert!(msg.contains("<b>City:</b> Tashkent"), "{msg}");
    assert!(msg.contains("<b>IP:</b> 203.0.113.7\n"), "{msg}");
    assert!(msg.contains("<b>Device:</b> Mozilla/5.0 (X11; Linux x86_64)"), "{msg}");
    assert!(msg.contains("(Asia/Tashkent)"), "{msg}");
}

#[tokio::test]
async fn forwarded_port_is_ignored() {
    let app = spawn_app().await;
    mount_geo_tashkent(&app).await;
    mount_telegram_ok(&app).await;

    let resp = app
        .signup_with_headers("a@example.com", &[("x-forwarded-for", "203.0.113.7:41234")])
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let msg = &app.telegram_messages().await[0];
    assert!(msg.contains("<b>IP:</b> 203.0.113.7\n"), "{msg}");
    assert!(msg.contains("<b>City:</b> Tashkent"), "{msg}");
}

#[tokio::test]
async fn telegram_request_shape() {
    let app = spawn_app().await;
    mount_telegram_ok(&app).await;

    app.signup("a@example.com").await;

    let requests = app.telegram_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["chat_id"], crate::helpers::CHAT_ID);
    assert_eq!(body["parse_mode"], "HTML");
}

#[tokio::test]
async fn geolocation_failure_uses_placeholders() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.geo_server)
        .await;
    mount_telegram_ok(&app).await;

    assert_eq!(app.signup("a@example.com").await.status().as_u16(), 200);

    let msg = &app.telegram_messages().await[0];
    assert!(msg.contains("<b>Country:</b> Unknown\n"), "{msg}");
    assert!(msg.contains("<b>City:</b> Unknown"), "{msg}");
    assert!(msg.contains("(UTC)"), "{msg}");
}

#[tokio::test]
async fn geolocation_timeout_uses_placeholders() {
    let app = spawn_app_with(|cfg| cfg.geolocation.timeout_milliseconds = 100).await;
    Mock::given(any())
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "country_name": "Too Late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&app.geo_server)
        .await;
    mount_telegram_ok(&app).await;

    assert_eq!(app.signup("a@example.com").await.status().as_u16(), 200);

    let msg = &app.telegram_messages().await[0];
    assert!(!msg.contains("Too Late"), "{msg}");
    assert!(msg.contains("<b>Country:</b> Unknown\n"), "{msg}");
    assert!(msg.contains("(UTC)"), "{msg}");
}

#[tokio::test]
async fn missing_headers_skip_geolocation() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.geo_server)
        .await;
    mount_telegram_ok(&app).await;

    let resp = app.signup_with_headers("a@example.com", &[]).await;
    assert_eq!(resp.status().as_u16(), 200);

    let msg = &app.telegram_messages().await[0];
    assert!(msg.contains("<b>IP:</b> Unknown"), "{msg}");
    assert!(msg.contains("<b>Country:</b> Unknown"), "{msg}");
}

#[tokio::test]
async fn telegram_failure_still_succeeds() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&app.telegram_server)
        .await;

    assert_eq!(app.signup("a@example.com").await.status().as_u16(), 200);
    // but the email is registered regardless
    assert_eq!(app.signup("a@example.com").await.status().as_u16(), 400);
}

#[tokio::test]
async fn registration_expires_after_ttl() {
    let app = spawn_app().await;
    mount_telegram_ok(&app).await;

    assert_eq!(app.signup("a@example.com").await.status().as_u16(), 200);

    app.clock.advance(chrono::Duration::days(19));
    assert_eq!(app.signup("a@example.com").await.status().as_u16(), 400);

    app.clock.advance(chrono::Duration::days(1));
    assert_eq!(app.signup("a@example.com").await.status().as_u16(), 200);
}

#[tokio::test]
async fn collection_expiry_is_extended_by_later_signups() {
    let app = spawn_app_with(|cfg| cfg.registry.expiry_mode = ExpiryMode::Collection).await;
    mount_telegram_ok(&app).await;

    assert_eq!(app.signup("early@example.com").await.status().as_u16(), 200);
    app.clock.advance(chrono::Duration::days(15));
    assert_eq!(app.signup("late@example.com").await.status().as_u16(), 200);
    app.clock.advance(chrono::Duration::days(6));

    // 21 days after its own signup, but the set was touched 6 days ago
    assert_eq!(app.signup("early@example.com").await.status().as_u16(), 400);

    app.clock.advance(chrono::Duration::days(14));
    assert_eq!(app.signup("early@example.com").await.status().as_u16(), 200);
    assert_eq!(app.signup("late@example.com").await.status().as_u16(), 200);
}

#[tokio::test]
async fn concurrent_duplicates_register_once() {
    let app = spawn_app().await;
    mount_telegram_ok(&app).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let url = format!("{}/api/send-notify", app.addr);
            tokio::spawn(async move {
                reqwest::Client::new()
                    .post(url)
                    .json(&serde_json::json!({ "email": "race@example.com" }))
                    .send()
                    .await
                    .expect("execute request")
                    .status()
                    .as_u16()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for h in handles {
        statuses.push(h.await.unwrap());
    }
    statuses.sort();
    assert_eq!(statuses, [200, 400, 400, 400, 400, 400, 400, 400]);
    assert_eq!(app.telegram_messages().await.len(), 1);
}
