use std::sync::Arc;

use paperflow::notify::{LogNotifier, Notifier, WebhookNotifier};
use paperflow::storage::LocalFileStore;
use paperflow::{config, db, routes, state, storage, Workflow};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paperflow=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    storage::ensure_dirs(&config.upload_folder)?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::run_migrations(pool.as_ref()).await?;

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!("Delivering notifications to {}", url);
            Arc::new(WebhookNotifier::new(url.clone(), config.notify_timeout)?)
        }
        None => Arc::new(LogNotifier),
    };
    let files = Arc::new(LocalFileStore::new(config.upload_folder.clone()));
    let workflow = Workflow::new(pool, files, notifier);

    if let Some((name, email)) = &config.chief_editor {
        if let Some(member) = workflow.bootstrap_chief_editor(name, email).await? {
            tracing::info!("Chief editor {} created with id {}", member.email, member.id);
        }
    }

    let state = Arc::new(state::AppState {
        workflow: Arc::new(workflow),
        config: config.clone(),
    });
    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Paperflow listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
