use std::error::Error;

use course_backend::{
    AppState, config::EngineConfig, course::CourseGenerator, create_router,
    points::PointCalculator,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env()?;
    let index = config.load_safe_points()?;
    tracing::info!("safe-point catalogue: {} entries", index.len());

    let points = PointCalculator::new(index)?;
    let generator = CourseGenerator::new(config.build_router()?, points);
    let state = AppState::new(generator).with_seed(config.seed);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("starting course backend on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
