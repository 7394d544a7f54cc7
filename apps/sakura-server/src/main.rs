#![forbid(unsafe_code)]

use std::net::SocketAddr;

use sakura_server::{build_router, init_tracing, AppConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let database_url = std::env::var("SAKURA_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("SAKURA_DATABASE_URL is required for runtime"))?;
    let discord_client_id = std::env::var("SAKURA_DISCORD_CLIENT_ID")
        .map_err(|_| anyhow::anyhow!("SAKURA_DISCORD_CLIENT_ID is required for runtime"))?;
    let discord_client_secret = std::env::var("SAKURA_DISCORD_CLIENT_SECRET")
        .map_err(|_| anyhow::anyhow!("SAKURA_DISCORD_CLIENT_SECRET is required for runtime"))?;
    let discord_bot_token = std::env::var("SAKURA_DISCORD_BOT_TOKEN")
        .map_err(|_| anyhow::anyhow!("SAKURA_DISCORD_BOT_TOKEN is required for runtime"))?;
    let discord_guild_id = std::env::var("SAKURA_DISCORD_GUILD_ID")
        .map_err(|_| anyhow::anyhow!("SAKURA_DISCORD_GUILD_ID is required for runtime"))?;
    let admin_role_ids = std::env::var("SAKURA_ADMIN_ROLE_IDS")
        .map_err(|_| anyhow::anyhow!("SAKURA_ADMIN_ROLE_IDS is required for runtime"))?
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();

    let app_config = AppConfig {
        database_url: Some(database_url),
        discord_client_id,
        discord_client_secret,
        discord_bot_token: Some(discord_bot_token),
        discord_guild_id,
        admin_role_ids,
        public_base_url: std::env::var("SAKURA_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| String::from("http://127.0.0.1:3000")),
        frontend_url: std::env::var("SAKURA_FRONTEND_URL")
            .unwrap_or_else(|_| String::from("http://127.0.0.1:5173")),
        tuner_url: std::env::var("SAKURA_TUNER_URL").ok(),
        session_key: std::env::var("SAKURA_SESSION_KEY").ok(),
        ..AppConfig::default()
    };
    let app = build_router(&app_config)?;
    let addr = std::env::var("SAKURA_BIND_ADDR")
        .unwrap_or_else(|_| String::from("0.0.0.0:3000"))
        .parse::<SocketAddr>()
        .map_err(|e| anyhow::anyhow!("invalid SAKURA_BIND_ADDR: {e}"))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "sakura-server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
