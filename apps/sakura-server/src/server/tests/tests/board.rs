use super::*;

async fn grant(app: &axum::Router, admin_token: &str, user_id: &str, role: &str) {
    let (status, _) = authed_json_request(
        app,
        "PATCH",
        format!("/api/admin/users/{user_id}"),
        admin_token,
        Some(json!({ "role": role, "approval": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn pending_users_cannot_see_the_board() {
    let (app, state) = build_app(&board_config());
    let token = login_member(&app, &state, "600", "newbie", &[MEMBER_GUILD_ROLE]).await;

    let (status, _) =
        authed_json_request(&app, "GET", String::from("/api/board"), &token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approved_viewers_read_the_board_but_cannot_write_it() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "601", "admin", &[ADMIN_GUILD_ROLE]).await;
    let viewer_token = login_member(&app, &state, "602", "viewer", &[MEMBER_GUILD_ROLE]).await;
    grant(&app, &admin_token, "602", "viewer").await;

    let (status, _) = authed_json_request(
        &app,
        "GET",
        String::from("/api/board"),
        &viewer_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/columns"),
        &viewer_token,
        Some(json!({ "title": "Sneaky" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn card_lifecycle_create_update_move_delete() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "603", "admin", &[ADMIN_GUILD_ROLE]).await;

    let todo = create_column_for_test(&app, &admin_token, "Todo").await;
    let doing = create_column_for_test(&app, &admin_token, "Doing").await;

    let first = create_card_for_test(&app, &admin_token, &todo, "First", json!({})).await;
    let second = create_card_for_test(&app, &admin_token, &todo, "Second", json!({})).await;

    // New cards append to the end of their column.
    let (_, payload) =
        authed_json_request(&app, "GET", String::from("/api/board"), &admin_token, None).await;
    let cards = payload.unwrap()["cards"].as_array().unwrap().clone();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0]["id"].as_str().unwrap(), first);
    assert_eq!(cards[0]["sort_order"], 0);
    assert_eq!(cards[1]["id"].as_str().unwrap(), second);
    assert_eq!(cards[1]["sort_order"], 1);

    let (status, payload) = authed_json_request(
        &app,
        "PATCH",
        format!("/api/cards/{first}"),
        &admin_token,
        Some(json!({ "description": "details", "due_date": "2026-09-15" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["description"], "details");
    assert_eq!(payload["due_date"], "2026-09-15");

    // An empty due date clears the stored one.
    let (status, payload) = authed_json_request(
        &app,
        "PATCH",
        format!("/api/cards/{first}"),
        &admin_token,
        Some(json!({ "due_date": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(payload.unwrap()["due_date"].is_null());

    let (status, payload) = authed_json_request(
        &app,
        "POST",
        format!("/api/cards/{first}/move"),
        &admin_token,
        Some(json!({ "column_id": doing })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["column_id"].as_str().unwrap(), doing);
    assert_eq!(payload["sort_order"], 0);

    // The source column renumbers densely.
    let (_, payload) =
        authed_json_request(&app, "GET", String::from("/api/board"), &admin_token, None).await;
    let cards = payload.unwrap()["cards"].as_array().unwrap().clone();
    let remaining: Vec<_> = cards
        .iter()
        .filter(|card| card["column_id"].as_str().unwrap() == todo)
        .collect();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["sort_order"], 0);

    let (status, _) = authed_json_request(
        &app,
        "DELETE",
        format!("/api/cards/{first}"),
        &admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn viewer_allow_lists_hide_cards_from_everyone_else() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "604", "admin", &[ADMIN_GUILD_ROLE]).await;
    let insider_token = login_member(&app, &state, "605", "insider", &[MEMBER_GUILD_ROLE]).await;
    let outsider_token = login_member(&app, &state, "606", "outsider", &[MEMBER_GUILD_ROLE]).await;
    grant(&app, &admin_token, "605", "viewer").await;
    grant(&app, &admin_token, "606", "viewer").await;

    let column = create_column_for_test(&app, &admin_token, "Secret").await;
    create_card_for_test(
        &app,
        &admin_token,
        &column,
        "Hidden",
        json!({ "allowed_viewer_ids": ["605"] }),
    )
    .await;

    let (_, payload) = authed_json_request(
        &app,
        "GET",
        String::from("/api/board"),
        &insider_token,
        None,
    )
    .await;
    assert_eq!(payload.unwrap()["cards"].as_array().unwrap().len(), 1);

    let (_, payload) = authed_json_request(
        &app,
        "GET",
        String::from("/api/board"),
        &outsider_token,
        None,
    )
    .await;
    assert_eq!(payload.unwrap()["cards"].as_array().unwrap().len(), 0);

    // Admins bypass the allow list.
    let (_, payload) =
        authed_json_request(&app, "GET", String::from("/api/board"), &admin_token, None).await;
    assert_eq!(payload.unwrap()["cards"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn editor_allow_lists_gate_card_edits() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "607", "admin", &[ADMIN_GUILD_ROLE]).await;
    let chosen_token = login_member(&app, &state, "608", "chosen", &[MEMBER_GUILD_ROLE]).await;
    let other_token = login_member(&app, &state, "609", "other", &[MEMBER_GUILD_ROLE]).await;
    grant(&app, &admin_token, "608", "editor").await;
    grant(&app, &admin_token, "609", "editor").await;

    let column = create_column_for_test(&app, &admin_token, "Guarded").await;
    let card = create_card_for_test(
        &app,
        &admin_token,
        &column,
        "Locked",
        json!({ "allowed_editor_ids": ["608"] }),
    )
    .await;

    let (status, _) = authed_json_request(
        &app,
        "PATCH",
        format!("/api/cards/{card}"),
        &chosen_token,
        Some(json!({ "title": "Edited" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = authed_json_request(
        &app,
        "PATCH",
        format!("/api/cards/{card}"),
        &other_token,
        Some(json!({ "title": "Blocked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deletion_switches_restrain_editors_but_not_admins() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "610", "admin", &[ADMIN_GUILD_ROLE]).await;
    let editor_token = login_member(&app, &state, "611", "editor", &[MEMBER_GUILD_ROLE]).await;
    grant(&app, &admin_token, "611", "editor").await;

    let (status, _) = authed_json_request(
        &app,
        "PATCH",
        String::from("/api/admin/users/611"),
        &admin_token,
        Some(json!({ "can_delete_cards": false, "can_delete_columns": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let column = create_column_for_test(&app, &admin_token, "Fragile").await;
    let card = create_card_for_test(&app, &admin_token, &column, "Kept", json!({})).await;

    let (status, _) = authed_json_request(
        &app,
        "DELETE",
        format!("/api/cards/{card}"),
        &editor_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = authed_json_request(
        &app,
        "DELETE",
        format!("/api/columns/{column}"),
        &editor_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = authed_json_request(
        &app,
        "DELETE",
        format!("/api/cards/{card}"),
        &admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn deleting_a_column_takes_its_cards_with_it() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "612", "admin", &[ADMIN_GUILD_ROLE]).await;

    let doomed = create_column_for_test(&app, &admin_token, "Doomed").await;
    let kept = create_column_for_test(&app, &admin_token, "Kept").await;
    create_card_for_test(&app, &admin_token, &doomed, "Gone", json!({})).await;
    create_card_for_test(&app, &admin_token, &kept, "Stays", json!({})).await;

    let (status, _) = authed_json_request(
        &app,
        "DELETE",
        format!("/api/columns/{doomed}"),
        &admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, payload) =
        authed_json_request(&app, "GET", String::from("/api/board"), &admin_token, None).await;
    let payload = payload.unwrap();
    assert_eq!(payload["columns"].as_array().unwrap().len(), 1);
    let cards = payload["cards"].as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["title"], "Stays");
}

#[tokio::test]
async fn column_reorder_requires_the_full_set_and_applies_positions() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "613", "admin", &[ADMIN_GUILD_ROLE]).await;

    let a = create_column_for_test(&app, &admin_token, "A").await;
    let b = create_column_for_test(&app, &admin_token, "B").await;

    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/columns/reorder"),
        &admin_token,
        Some(json!({ "column_ids": [a] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/columns/reorder"),
        &admin_token,
        Some(json!({ "column_ids": [b, a] })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, payload) =
        authed_json_request(&app, "GET", String::from("/api/board"), &admin_token, None).await;
    let columns = payload.unwrap()["columns"].as_array().unwrap().clone();
    assert_eq!(columns[0]["title"], "B");
    assert_eq!(columns[1]["title"], "A");
}

#[tokio::test]
async fn commenting_needs_view_access_and_a_body() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "614", "admin", &[ADMIN_GUILD_ROLE]).await;
    let viewer_token = login_member(&app, &state, "615", "viewer", &[MEMBER_GUILD_ROLE]).await;
    let blocked_token = login_member(&app, &state, "616", "blocked", &[MEMBER_GUILD_ROLE]).await;
    grant(&app, &admin_token, "615", "viewer").await;
    grant(&app, &admin_token, "616", "viewer").await;

    let column = create_column_for_test(&app, &admin_token, "Talk").await;
    let card = create_card_for_test(
        &app,
        &admin_token,
        &column,
        "Thread",
        json!({ "allowed_viewer_ids": ["615"] }),
    )
    .await;

    let (status, payload) = authed_json_request(
        &app,
        "POST",
        format!("/api/cards/{card}/comments"),
        &viewer_token,
        Some(json!({ "body": "looks good" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["author_id"], "615");
    assert_eq!(payload["body"], "looks good");

    let (status, _) = authed_json_request(
        &app,
        "POST",
        format!("/api/cards/{card}/comments"),
        &blocked_token,
        Some(json!({ "body": "let me in" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = authed_json_request(
        &app,
        "POST",
        format!("/api/cards/{card}/comments"),
        &viewer_token,
        Some(json!({ "body": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_tag_strips_it_from_cards() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "617", "admin", &[ADMIN_GUILD_ROLE]).await;

    let (status, payload) = authed_json_request(
        &app,
        "POST",
        String::from("/api/tags"),
        &admin_token,
        Some(json!({ "label": "urgent", "color": "#ff0000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tag_id = payload.unwrap()["id"].as_str().unwrap().to_owned();

    let column = create_column_for_test(&app, &admin_token, "Tagged").await;
    let card = create_card_for_test(
        &app,
        &admin_token,
        &column,
        "Marked",
        json!({ "tag_ids": [tag_id] }),
    )
    .await;

    let (status, _) = authed_json_request(
        &app,
        "DELETE",
        format!("/api/tags/{tag_id}"),
        &admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, payload) =
        authed_json_request(&app, "GET", String::from("/api/board"), &admin_token, None).await;
    let payload = payload.unwrap();
    assert_eq!(payload["tags"].as_array().unwrap().len(), 0);
    let cards = payload["cards"].as_array().unwrap();
    let tagged = cards
        .iter()
        .find(|value| value["id"].as_str().unwrap() == card)
        .unwrap();
    assert_eq!(tagged["tag_ids"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn invalid_tag_colors_and_labels_are_rejected() {
    let (app, state) = build_app(&board_config());
    let admin_token = login_member(&app, &state, "618", "admin", &[ADMIN_GUILD_ROLE]).await;

    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/tags"),
        &admin_token,
        Some(json!({ "label": "ok", "color": "red" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = authed_json_request(
        &app,
        "POST",
        String::from("/api/tags"),
        &admin_token,
        Some(json!({ "label": "", "color": "#00ff00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_fall_back_to_defaults_and_accept_admin_updates() {
    let (app, state) = build_app(&board_config());

    // No auth needed: the login page brands itself from this endpoint.
    let request = Request::builder()
        .method("GET")
        .uri("/api/settings")
        .header("x-forwarded-for", TEST_IP)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let payload: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(payload["board_title"], "SakuraBoard");
    assert_eq!(payload["accent_color"], "#ffb7c5");

    let admin_token = login_member(&app, &state, "619", "admin", &[ADMIN_GUILD_ROLE]).await;
    let (status, payload) = authed_json_request(
        &app,
        "PATCH",
        String::from("/api/settings"),
        &admin_token,
        Some(json!({ "board_title": "Team Board", "accent_color": "#112233" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload = payload.unwrap();
    assert_eq!(payload["board_title"], "Team Board");
    assert_eq!(payload["accent_color"], "#112233");

    let (status, _) = authed_json_request(
        &app,
        "PATCH",
        String::from("/api/settings"),
        &admin_token,
        Some(json!({ "accent_color": "blue" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
