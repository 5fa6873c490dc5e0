use flipside_api::{
    app, apply_migrations, connect, ensure_database_exists, init_tracing, load_embedded, resolve, AppState, Settings,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_tracing();

    let catalog = load_embedded()?;
    let model = resolve(&catalog)?;

    ensure_database_exists(&settings.database_url).await?;
    let pool = connect(&settings).await?;
    if settings.run_migrations {
        apply_migrations(&pool, &catalog).await?;
    }

    let state = AppState::new(pool, model);
    let router = app(state, &settings);
    let listener = TcpListener::bind(settings.bind_addr()?).await?;
    tracing::info!("Flipside API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
