use super::*;

#[tokio::test]
async fn first_login_without_the_admin_role_starts_pending_viewer() {
    let (app, state) = build_app(&board_config());
    let token = login_member(&app, &state, "200", "newcomer", &[MEMBER_GUILD_ROLE]).await;

    let (status, payload) =
        authed_json_request(&app, "GET", String::from("/api/users/me"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["role"], "viewer");
    assert_eq!(payload["approval"], "pending");
    assert_eq!(payload["role_ids"][0], MEMBER_GUILD_ROLE);
}

#[tokio::test]
async fn holding_the_admin_guild_role_grants_admin_on_login() {
    let (app, state) = build_app(&board_config());
    let token = login_member(&app, &state, "201", "boss", &[ADMIN_GUILD_ROLE]).await;

    let (status, payload) =
        authed_json_request(&app, "GET", String::from("/api/users/me"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["role"], "admin");
    assert_eq!(payload["approval"], "approved");
}

#[tokio::test]
async fn me_reflects_a_role_gained_after_login() {
    let (app, state) = build_app(&board_config());
    let token = login_member(&app, &state, "202", "climber", &[]).await;

    // The user is handed the admin guild role afterwards.
    seed_guild_member(&state, "202", "climber", &[ADMIN_GUILD_ROLE]).await;

    let (status, payload) =
        authed_json_request(&app, "GET", String::from("/api/users/me"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["role"], "admin");
    assert_eq!(payload["approval"], "approved");
}

#[tokio::test]
async fn leaving_the_guild_demotes_a_stored_admin() {
    let (app, state) = build_app(&board_config());
    let token = login_member(&app, &state, "203", "leaver", &[ADMIN_GUILD_ROLE]).await;

    state.directory_members.write().await.remove("203");

    let (status, payload) =
        authed_json_request(&app, "GET", String::from("/api/users/me"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["role"], "viewer");
    assert_eq!(payload["approval"], "pending");
    assert_eq!(payload["role_ids"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn manual_grants_survive_membership_refresh_while_in_guild() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "210", "grantor", &[ADMIN_GUILD_ROLE]).await;
    let member_token = login_member(&app, &state, "211", "grantee", &[MEMBER_GUILD_ROLE]).await;

    let (status, _) = authed_json_request(
        &app,
        "PATCH",
        String::from("/api/admin/users/211"),
        &admin_token,
        Some(json!({ "role": "editor", "approval": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // A later refresh keeps the manual grant because the user is still a
    // guild member without the admin role.
    let (status, payload) = authed_json_request(
        &app,
        "GET",
        String::from("/api/users/me"),
        &member_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["role"], "editor");
    assert_eq!(payload["approval"], "approved");
}

#[tokio::test]
async fn directory_outage_serves_the_stored_record() {
    let (app, state) = build_app(&board_config());
    let token = login_member(&app, &state, "204", "steady", &[ADMIN_GUILD_ROLE]).await;

    state
        .directory_outage
        .store(true, std::sync::atomic::Ordering::Relaxed);

    let (status, payload) =
        authed_json_request(&app, "GET", String::from("/api/users/me"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["role"], "admin");
    assert_eq!(payload["approval"], "approved");
}
