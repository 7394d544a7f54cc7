use super::*;

#[tokio::test]
async fn callback_delivers_the_session_both_as_cookie_and_redirect_token() {
    let (app, state) = build_app(&board_config());
    seed_guild_member(&state, "100", "alice", &[MEMBER_GUILD_ROLE]).await;
    seed_oauth_code(&state, "good-code", "100", "alice").await;

    let (token, cookie) = login_via_callback(&app, "good-code", "stayIn").await;
    assert!(!token.is_empty());
    assert!(cookie.starts_with("sakura_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=2592000"));

    // The token from the redirect works as a bearer credential.
    let (status, payload) =
        authed_json_request(&app, "GET", String::from("/api/users/me"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["id"], "100");
    assert_eq!(payload["display_name"], "alice");
}

#[tokio::test]
async fn declining_to_stay_logged_in_yields_a_session_scoped_cookie() {
    let (app, state) = build_app(&board_config());
    seed_guild_member(&state, "101", "bob", &[]).await;
    seed_oauth_code(&state, "short-code", "101", "bob").await;

    let (_, cookie) = login_via_callback(&app, "short-code", "noStay").await;
    assert!(!cookie.contains("Max-Age"));
}

#[tokio::test]
async fn tuner_login_redirects_to_the_tuner_url() {
    let config = AppConfig {
        tuner_url: Some(String::from("http://tuner.test/landing")),
        ..board_config()
    };
    let (app, state) = build_app(&config);
    seed_guild_member(&state, "102", "carol", &[]).await;
    seed_oauth_code(&state, "tuner-code", "102", "carol").await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/auth/discord/callback?code=tuner-code&state=noStay_tuner")
        .header("x-forwarded-for", TEST_IP)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("http://tuner.test/landing"));
    assert!(location.contains("token="));
}

#[tokio::test]
async fn rejected_oauth_code_is_unauthorized() {
    let (app, _state) = build_app(&board_config());

    let request = Request::builder()
        .method("GET")
        .uri("/api/auth/discord/callback?code=unknown&state=noStay")
        .header("x-forwarded-for", TEST_IP)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn directory_outage_during_callback_is_a_bad_gateway() {
    let (app, state) = build_app(&board_config());
    seed_oauth_code(&state, "any-code", "103", "dave").await;
    state
        .directory_outage
        .store(true, std::sync::atomic::Ordering::Relaxed);

    let request = Request::builder()
        .method("GET")
        .uri("/api/auth/discord/callback?code=any-code&state=noStay")
        .header("x-forwarded-for", TEST_IP)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn login_entrypoint_redirects_into_the_authorization_flow() {
    let (app, _state) = build_app(&board_config());

    let request = Request::builder()
        .method("GET")
        .uri("/api/auth/discord?stay=true&tuner=true")
        .header("x-forwarded-for", TEST_IP)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.contains("/oauth2/authorize"));
    assert!(location.contains("client_id=client-id"));
    assert!(location.contains("state=stayIn_tuner"));
    assert!(location.contains("scope=identify"));
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let (app, _state) = build_app(&board_config());

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header("x-forwarded-for", TEST_IP)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response.headers()["set-cookie"].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn session_cookie_alone_authenticates_requests() {
    let (app, state) = build_app(&board_config());
    seed_guild_member(&state, "104", "erin", &[]).await;
    seed_oauth_code(&state, "cookie-code", "104", "erin").await;
    let (_, cookie) = login_via_callback(&app, "cookie-code", "stayIn").await;

    let cookie_pair = cookie.split(';').next().unwrap();
    let request = Request::builder()
        .method("GET")
        .uri("/api/users/me")
        .header("cookie", cookie_pair)
        .header("x-forwarded-for", TEST_IP)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn requests_without_credentials_are_unauthorized() {
    let (app, _state) = build_app(&board_config());

    let request = Request::builder()
        .method("GET")
        .uri("/api/users/me")
        .header("x-forwarded-for", TEST_IP)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
