use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curriculum_db::tree_manager::NodeTreeManager;
use curriculum_tree_check::config::CheckConfig;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curriculum_tree_check=debug,curriculum_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = CheckConfig::from_env();
    tracing::info!(
        max_connections = config.max_connections,
        lock_timeout_ms = config.lock_timeout_ms,
        curriculum_id = ?config.curriculum_id,
        "Loaded tree-check configuration"
    );

    // --- Database ---
    let pool = curriculum_db::create_pool(&config.database_url, &config.pool_settings())
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    curriculum_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    curriculum_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Scan ---
    let manager = NodeTreeManager::with_settings(pool, config.tree_settings());
    match curriculum_tree_check::run_check(&manager, config.curriculum_id).await {
        Ok(summary) if summary.is_clean() => {
            tracing::info!(
                curricula = summary.curricula_scanned,
                "All curriculum trees are consistent"
            );
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            tracing::warn!(
                curricula = summary.curricula_scanned,
                affected = summary.reports_with_issues.len(),
                issues = summary.issue_count(),
                "Tree integrity issues found"
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!(error = %err, retryable = err.is_retryable(), "Tree check failed");
            ExitCode::FAILURE
        }
    }
}
