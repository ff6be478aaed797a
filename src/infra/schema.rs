//! Table bootstrap for the parameter registry.
//!
//! Only MySQL and Postgres hosts are supported; any other backend aborts the
//! install before a statement is produced.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const TABLE_NAME: &str = "page_request_params";

const POSTGRES_DDL: &str =
    include_str!("../../migrations/20261019000000_create_page_request_params.sql");
const MYSQL_DDL: &str = include_str!("../../sql/mysql/page_request_params.sql");

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unsupported database backend `{backend}`; only mysql and postgres are supported")]
    UnsupportedBackend { backend: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaBackend {
    MySql,
    Postgres,
}

impl SchemaBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaBackend::MySql => "mysql",
            SchemaBackend::Postgres => "postgres",
        }
    }

    pub fn create_table_sql(self) -> &'static str {
        match self {
            SchemaBackend::MySql => MYSQL_DDL,
            SchemaBackend::Postgres => POSTGRES_DDL,
        }
    }

    pub fn schema_update(self) -> SchemaUpdate {
        SchemaUpdate {
            backend: self,
            table: TABLE_NAME,
            statement: self.create_table_sql(),
        }
    }
}

impl FromStr for SchemaBackend {
    type Err = SchemaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(SchemaBackend::MySql),
            "postgres" => Ok(SchemaBackend::Postgres),
            _ => Err(SchemaError::UnsupportedBackend {
                backend: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for SchemaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table the host must create at install or upgrade time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaUpdate {
    pub backend: SchemaBackend,
    pub table: &'static str,
    pub statement: &'static str,
}
