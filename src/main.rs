use anyhow::{anyhow, Result};
use foodgram::{
    actions::{ensure_admin, NewUser},
    pool::{create_pool, run_migrations},
    routes, AppState, ServerConfig,
};
use tracing_subscriber::EnvFilter;
use warp::Filter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.max_connections).await?;
    run_migrations(&pool).await?;
    log::info!("Database migrations applied");

    if let Some(admin) = config.admin.as_ref() {
        let user = NewUser {
            email: admin.email.clone(),
            username: admin.username.clone(),
            first_name: String::new(),
            last_name: String::new(),
            password: admin.password.clone(),
        };
        ensure_admin(&user, &pool).await.map_err(|e| {
            anyhow!(
                "Failed to create administrator ({}): {}",
                e.code,
                e.info.clone().unwrap_or_default()
            )
        })?;
    }

    let state = AppState::new(pool, &config);
    let api = routes(state).with(warp::log("foodgram::api"));

    log::info!("Listening on http://{}", config.bind_address);
    warp::serve(api).run(config.bind_address).await;

    Ok(())
}
