use actix_web::{middleware::Compress, web, App, HttpServer};
use actix_cors::Cors;
use utoipa_swagger_ui::SwaggerUi;

use heritagelink::moderation::{GenerativeModerator, Moderator};
use heritagelink::openapi::ApiDoc;
use heritagelink::rate_limit::RateLimiterFacade;
use heritagelink::repo::Repo;
use heritagelink::settings::Settings;
use heritagelink::{config, AppState, SecurityHeaders};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()

#[cfg(feature = "postgres-store")]
async fn build_repo(settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    use heritagelink::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let db_url = settings
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for postgres-store"))?;
    let pool = PgPoolOptions::new().max_connections(5).connect_lazy(db_url)?;
    let repo = PgRepo::new(pool);
    repo.migrate().await?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(_settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    info!("Using in-memory repository backend");
    Ok(Arc::new(heritagelink::repo::inmem::InMemRepo::new()))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // .env is only read in debug builds
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Please copy .env.example to .env and configure it");
            std::process::exit(1);
        }
    };

    info!("Bootstrapping Heritagelink server");
    info!(model = %settings.moderation.model, "Comment moderation configured");

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let repo = build_repo(&settings).await?;
    let moderator: Arc<dyn Moderator> = Arc::new(GenerativeModerator::new(
        settings.moderation.api_base.clone(),
        settings.moderation.api_key.clone(),
        settings.moderation.model.clone(),
    ));
    let state = AppState {
        repo,
        moderator,
        rate_limiter: Some(RateLimiterFacade::new(settings.rate_limit.clone())),
        metrics,
    };

    let openapi = ApiDoc::openapi();
    let security = SecurityHeaders::from_settings(&settings);
    let frontend_url = settings.frontend_url.clone();

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            // during local dev allow the frontend dev server
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);
        if let Some(front) = &frontend_url {
            cors = cors.allowed_origin(front);
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(security.clone())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(settings.bind_addr.as_str())?;

    info!(addr = %settings.bind_addr, "Listening");

    server.run().await?;
    Ok(())
}
