use std::sync::Arc;

use axum::http::HeaderValue;
use log::info;
use tower_http::cors::{Any, CorsLayer};

use portalserver::ai::{configure_ai_routes, OpenAiProvider};
use portalserver::auth::configure_auth_routes;
use portalserver::config::AppConfig;
use portalserver::email::Mailer;
use portalserver::operator::configure_operator_routes;
use portalserver::payments::configure_payment_routes;
use portalserver::shared::state::AppState;
use portalserver::shared::utils::{create_conn, run_migrations};
use portalserver::tickets::configure_ticket_routes;
use portalserver::users::configure_user_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;

    let pool = create_conn(&config.database_url(), config.database.max_connections)?;
    {
        let mut conn = pool.get()?;
        run_migrations(&mut conn)?;
    }

    let ai = Arc::new(OpenAiProvider::new(&config.ai));
    let mailer = Arc::new(Mailer::new(&config.email)?);

    let frontend_origin: HeaderValue = config
        .frontend_url
        .parse()
        .map_err(|_| anyhow::anyhow!("FRONTEND_URL is not a valid origin"))?;
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState {
        conn: pool,
        config,
        ai,
        mailer,
    });

    let app = axum::Router::new()
        .merge(configure_auth_routes())
        .merge(configure_user_routes())
        .merge(configure_ticket_routes())
        .merge(configure_payment_routes())
        .merge(configure_operator_routes())
        .merge(configure_ai_routes())
        .layer(cors)
        .with_state(state);

    info!("listening on {bind_addr}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
