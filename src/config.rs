use std::{env, fmt, net::SocketAddr, str::FromStr};

use crate::error::AppError;

/// Which persistence gateway the process runs against. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite { database_url: String },
    Memory,
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite { .. } => "sqlite",
            StoreBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Sqlite,
    Memory,
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "memory" => Ok(BackendKind::Memory),
            other => Err(AppError::Config(format!(
                "invalid STORE_BACKEND `{other}` (expected `sqlite` or `memory`)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub store: StoreBackend,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let store = resolve_backend(
            env::var("STORE_BACKEND").ok().as_deref(),
            env::var("DATABASE_URL").ok(),
        )?;

        Ok(Self { listen_addr, store })
    }
}

fn resolve_backend(
    requested: Option<&str>,
    database_url: Option<String>,
) -> Result<StoreBackend, AppError> {
    let database_url = database_url.filter(|url| !url.trim().is_empty());
    let kind = match requested.filter(|value| !value.trim().is_empty()) {
        Some(value) => value.parse()?,
        None if database_url.is_some() => BackendKind::Sqlite,
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            BackendKind::Memory
        }
    };

    match kind {
        BackendKind::Memory => Ok(StoreBackend::Memory),
        BackendKind::Sqlite => database_url
            .map(|database_url| StoreBackend::Sqlite { database_url })
            .ok_or_else(|| {
                AppError::Config("STORE_BACKEND=sqlite requires DATABASE_URL".to_string())
            }),
    }
}
