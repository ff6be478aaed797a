use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the renderkey administration binary.
#[derive(Debug, Parser)]
#[command(
    name = "renderkey",
    version,
    about = "Request-parameter render keys: schema and registry tools"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "RENDERKEY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the table-creation statement for a database backend.
    Schema(SchemaArgs),
    /// Apply the Postgres migrations to the configured database.
    Migrate(MigrateArgs),
    /// Show the declared parameters of a page and the key suffix for a query.
    Inspect(InspectArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SchemaArgs {
    /// Database backend tag (mysql|postgres).
    #[arg(long = "backend", value_name = "BACKEND", default_value = "postgres")]
    pub backend: String,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Fully-qualified page title.
    #[arg(long = "page", value_name = "TITLE")]
    pub page: String,

    /// Durable numeric id of the page.
    #[arg(long = "page-id", value_name = "ID")]
    pub page_id: i64,

    /// Query string to derive the key suffix from.
    #[arg(long = "query", value_name = "QUERY", default_value = "")]
    pub query: String,
}
