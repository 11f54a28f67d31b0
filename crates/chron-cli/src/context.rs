use anyhow::Context;
use chron_config::ChronConfig;
use chron_db::service::AuditService;

use crate::cli::GlobalFlags;

/// Loaded configuration plus an open audit service.
pub struct AppContext {
    pub config: ChronConfig,
    pub service: AuditService,
}

impl AppContext {
    /// Load layered config, apply `--db`, and open the store.
    pub async fn init(flags: &GlobalFlags) -> anyhow::Result<Self> {
        let mut config = ChronConfig::load_with_dotenv().context("failed to load configuration")?;
        if let Some(ref db) = flags.db {
            config.store.path.clone_from(db);
        }

        let service = AuditService::from_config(&config)
            .await
            .with_context(|| format!("failed to open audit store at {}", config.store.path))?;
        Ok(Self { config, service })
    }

    /// `--limit` when given, otherwise `general.default_limit`.
    pub fn limit(&self, flags: &GlobalFlags) -> u32 {
        flags.limit.unwrap_or(self.config.general.default_limit)
    }
}
