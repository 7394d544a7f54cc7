use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, StatusCode},
    routing::{delete, get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::{
    core::{AppConfig, AppState},
    handlers::{
        admin::{
            ban_member, delete_user, kick_member, list_guild_members, list_users, timeout_member,
            update_user, verify_all,
        },
        auth::{discord_callback, discord_login, logout},
        board::{
            add_comment, board_snapshot, create_card, create_column, create_tag, delete_card,
            delete_column, delete_tag, get_settings, move_card, reorder_columns, update_card,
            update_column, update_settings, update_tag,
        },
        users::me,
    },
    types::{health, metrics},
};

pub fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    let app_state = AppState::new(config)?;
    build_router_with_state(config, app_state)
}

pub(crate) fn build_router_with_state(
    config: &AppConfig,
    app_state: AppState,
) -> anyhow::Result<Router> {
    if config.rate_limit_requests_per_minute == 0 {
        return Err(anyhow!("rate limit must be at least 1 request per minute"));
    }
    if config.max_body_bytes == 0 {
        return Err(anyhow!("body limit must be at least 1 byte"));
    }
    if config.request_timeout.is_zero() {
        return Err(anyhow!("request timeout must be non-zero"));
    }
    if config.discord_guild_id.is_empty() {
        return Err(anyhow!("discord guild id must be set"));
    }

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .period(Duration::from_secs(60))
            .burst_size(config.rate_limit_requests_per_minute)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("invalid governor configuration"))?,
    );
    let request_id_header = HeaderName::from_static("x-request-id");
    let governor_layer = GovernorLayer::new(governor_config);

    let routes = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/auth/discord", get(discord_login))
        .route("/api/auth/discord/callback", get(discord_callback))
        .route("/api/auth/logout", post(logout))
        .route("/api/users/me", get(me))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/verify-all", post(verify_all))
        .route(
            "/api/admin/users/{user_id}",
            patch(update_user).delete(delete_user),
        )
        .route("/api/admin/guild/members", get(list_guild_members))
        .route(
            "/api/admin/guild/members/{user_id}/timeout",
            post(timeout_member),
        )
        .route("/api/admin/guild/members/{user_id}/kick", post(kick_member))
        .route("/api/admin/guild/members/{user_id}/ban", post(ban_member))
        .route("/api/board", get(board_snapshot))
        .route("/api/tags", post(create_tag))
        .route("/api/tags/{tag_id}", patch(update_tag).delete(delete_tag))
        .route("/api/columns", post(create_column))
        .route("/api/columns/reorder", post(reorder_columns))
        .route(
            "/api/columns/{column_id}",
            patch(update_column).delete(delete_column),
        )
        .route("/api/cards", post(create_card))
        .route(
            "/api/cards/{card_id}",
            patch(update_card).delete(delete_card),
        )
        .route("/api/cards/{card_id}/move", post(move_card))
        .route("/api/cards/{card_id}/comments", post(add_comment))
        .route(
            "/api/settings",
            get(get_settings).patch(update_settings),
        );

    Ok(routes
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
                .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                ))
                .layer(governor_layer),
        ))
}
