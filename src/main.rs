use std::{process, sync::Arc};

use renderkey::{
    application::{error::AppError, extension::RequestParamsExtension, request::QueryParams},
    cache::{ParamRegistry, RegistryConfig},
    config,
    domain::params::{PageId, PageIdentity, PageRef},
    infra::{db::PostgresRepositories, error::InfraError, schema::SchemaBackend, telemetry},
};
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Schema(args) => run_schema(args),
        config::Command::Migrate(_) => run_migrate(&settings).await,
        config::Command::Inspect(args) => run_inspect(&settings, args).await,
    }
}

fn run_schema(args: config::SchemaArgs) -> Result<(), AppError> {
    let backend: SchemaBackend = args.backend.parse()?;
    let update = backend.schema_update();
    info!(backend = %backend, table = update.table, "Emitting schema bootstrap");
    println!("{}", update.statement.trim_end());
    Ok(())
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let repositories = connect(settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!("Migrations applied");
    Ok(())
}

async fn run_inspect(
    settings: &config::Settings,
    args: config::InspectArgs,
) -> Result<(), AppError> {
    let page_id = PageId::new(args.page_id).ok_or_else(|| {
        AppError::from(InfraError::configuration("page id must be a positive integer"))
    })?;
    let page = PageRef::saved(PageIdentity::new(args.page)?, page_id);

    let repositories = connect(settings).await?;
    let registry = Arc::new(ParamRegistry::new(
        RegistryConfig::from(&settings.registry),
        repositories,
    ));
    let extension = RequestParamsExtension::new(registry);
    let mut ctx = extension.begin(Arc::new(QueryParams::from_query(&args.query)));

    let entry = ctx.lookup(&page).await?;
    let suffix = ctx.derive_key_suffix(&page).await?;

    let report = json!({
        "page": page.identity.as_str(),
        "page_id": page_id.get(),
        "origin": entry.origin.as_str(),
        "params": entry.params,
        "suffix": suffix,
    });
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to render report: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn connect(settings: &config::Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}
