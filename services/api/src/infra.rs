use apprenticeship::config::{AppConfig, TelegramConfig};
use apprenticeship::error::AppError;
use apprenticeship::notify::{LogNotifier, Notifier, NotifyError, TelegramNotifier};
use apprenticeship::registry::{ChannelId, InMemoryRecordStore, RegistrySeed};
use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Notifier chosen at startup from the Telegram settings.
#[derive(Debug)]
pub(crate) enum ConfiguredNotifier {
    Telegram(TelegramNotifier),
    Log(LogNotifier),
}

impl ConfiguredNotifier {
    pub(crate) fn from_config(config: &TelegramConfig) -> Result<Self, AppError> {
        match &config.bot_token {
            Some(token) => {
                info!(api_base = %config.api_base, "telegram notifications enabled");
                Ok(Self::Telegram(TelegramNotifier::new(
                    config.api_base.clone(),
                    token.clone(),
                )?))
            }
            None => {
                warn!("TELEGRAM_BOT_TOKEN not set; notifications will only be logged");
                Ok(Self::Log(LogNotifier))
            }
        }
    }
}

#[async_trait]
impl Notifier for ConfiguredNotifier {
    async fn send(&self, channel_id: &ChannelId, text: &str) -> Result<(), NotifyError> {
        match self {
            ConfiguredNotifier::Telegram(notifier) => notifier.send(channel_id, text).await,
            ConfiguredNotifier::Log(notifier) => notifier.send(channel_id, text).await,
        }
    }
}

pub(crate) fn load_store(config: &AppConfig) -> Result<InMemoryRecordStore, AppError> {
    match &config.registry.seed_path {
        Some(path) => {
            let seed = RegistrySeed::from_path(path)?;
            info!(
                path = %path.display(),
                users = seed.users.len(),
                types = seed.apprenticeship_types.len(),
                "registry seeded"
            );
            Ok(InMemoryRecordStore::from_seed(seed))
        }
        None => {
            warn!("APP_SEED_PATH not set; starting with an empty registry");
            Ok(InMemoryRecordStore::default())
        }
    }
}
