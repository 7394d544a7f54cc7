use super::*;
use super::super::super::discord::ModerationAction;

#[tokio::test]
async fn admin_routes_reject_non_admins() {
    let (app, state) = build_app(&board_config());
    let token = login_member(&app, &state, "300", "plain", &[MEMBER_GUILD_ROLE]).await;

    for (method, uri) in [
        ("GET", "/api/admin/users"),
        ("POST", "/api/admin/users/verify-all"),
        ("GET", "/api/admin/guild/members"),
    ] {
        let (status, _) =
            authed_json_request(&app, method, String::from(uri), &token, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
    }
}

#[tokio::test]
async fn a_stale_admin_credential_no_longer_opens_admin_routes() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "301", "was-admin", &[ADMIN_GUILD_ROLE]).await;

    // The admin leaves the guild and another admin refreshes the stored
    // record via verify-all.
    state.directory_members.write().await.remove("301");
    let other_admin = login_member(&app, &state, "302", "still-admin", &[ADMIN_GUILD_ROLE]).await;
    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/admin/users/verify-all"),
        &other_admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The old credential still decrypts, but the stored role decides.
    let (status, _) = authed_json_request(
        &app,
        "GET",
        String::from("/api/admin/users"),
        &admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn verify_all_reports_updated_unchanged_and_errored_counts() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "303", "counter", &[ADMIN_GUILD_ROLE]).await;
    login_member(&app, &state, "304", "mover", &[MEMBER_GUILD_ROLE]).await;

    // "mover" leaves the guild between logins.
    state.directory_members.write().await.remove("304");

    let (status, payload) = authed_json_request(
        &app,
        "POST",
        String::from("/api/admin/users/verify-all"),
        &admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    // "mover" drops its cached role ids, "counter" is untouched.
    assert_eq!(payload["updated"], 1);
    assert_eq!(payload["unchanged"], 1);
    assert_eq!(payload["errored"], 0);
}

#[tokio::test]
async fn admins_can_adjust_role_approval_and_deletion_switches() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "305", "hr", &[ADMIN_GUILD_ROLE]).await;
    login_member(&app, &state, "306", "subject", &[MEMBER_GUILD_ROLE]).await;

    let (status, payload) = authed_json_request(
        &app,
        "PATCH",
        String::from("/api/admin/users/306"),
        &admin_token,
        Some(json!({
            "role": "editor",
            "approval": "approved",
            "can_delete_cards": false
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["role"], "editor");
    assert_eq!(payload["approval"], "approved");
    assert_eq!(payload["permissions"]["can_delete_cards"], false);
    assert_eq!(payload["permissions"]["can_delete_columns"], true);
}

#[tokio::test]
async fn the_admin_role_cannot_be_assigned_by_hand() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "307", "boss", &[ADMIN_GUILD_ROLE]).await;
    login_member(&app, &state, "308", "hopeful", &[MEMBER_GUILD_ROLE]).await;

    let (status, _) = authed_json_request(
        &app,
        "PATCH",
        String::from("/api/admin/users/308"),
        &admin_token,
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_user_forgets_the_record() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "309", "cleaner", &[ADMIN_GUILD_ROLE]).await;
    login_member(&app, &state, "310", "goner", &[MEMBER_GUILD_ROLE]).await;

    let (status, _) = authed_json_request(
        &app,
        "DELETE",
        String::from("/api/admin/users/310"),
        &admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = authed_json_request(
        &app,
        "DELETE",
        String::from("/api/admin/users/310"),
        &admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn guild_member_listing_pages_by_user_id() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "311", "lister", &[ADMIN_GUILD_ROLE]).await;
    seed_guild_member(&state, "400", "m1", &[]).await;
    seed_guild_member(&state, "500", "m2", &[]).await;

    let (status, payload) = authed_json_request(
        &app,
        "GET",
        String::from("/api/admin/guild/members?after=311"),
        &admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    let members = payload["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["id"], "400");
    assert_eq!(members[1]["id"], "500");
    // Short page means no further cursor.
    assert!(payload["next_after"].is_null());
}

#[tokio::test]
async fn moderation_actions_reach_the_directory_with_their_reason() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "312", "mod", &[ADMIN_GUILD_ROLE]).await;
    seed_guild_member(&state, "313", "trouble", &[]).await;

    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/admin/guild/members/313/timeout"),
        &admin_token,
        Some(json!({ "duration_minutes": 10, "reason": "spam" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/admin/guild/members/313/kick"),
        &admin_token,
        Some(json!({ "reason": "repeat spam" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let log = state.moderation_log.read().await;
    assert_eq!(log.len(), 2);
    assert!(matches!(
        &log[0],
        ModerationAction::Timeout { user_id, reason, .. }
            if user_id == "313" && reason == "spam"
    ));
    assert!(matches!(
        &log[1],
        ModerationAction::Kick { user_id, .. } if user_id == "313"
    ));
}

#[tokio::test]
async fn moderation_requires_a_reason_and_a_positive_duration() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "314", "mod", &[ADMIN_GUILD_ROLE]).await;

    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/admin/guild/members/999/ban"),
        &admin_token,
        Some(json!({ "reason": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/admin/guild/members/999/timeout"),
        &admin_token,
        Some(json!({ "duration_minutes": 0, "reason": "why" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
