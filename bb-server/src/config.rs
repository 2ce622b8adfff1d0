//! Provider credential resolution
//!
//! API keys resolve Database → ENV → TOML. The first valid source wins; a
//! warning names every source when more than one defines the same key.

use bb_common::config::{ProvidersConfig, TomlConfig};
use bb_common::db::settings::get_setting;
use bb_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::providers::akool::AkoolProvider;
use crate::providers::replicate::ReplicateProvider;
use crate::providers::runway::RunwayProvider;
use crate::providers::{ProviderKind, ProviderRegistry};

/// Where a provider key lives in each tier
#[derive(Debug, Clone, Copy)]
pub struct KeyLocation {
    pub setting_key: &'static str,
    pub env_var: &'static str,
}

pub fn key_location(kind: ProviderKind) -> KeyLocation {
    match kind {
        ProviderKind::Replicate => KeyLocation {
            setting_key: "replicate_api_token",
            env_var: "BB_REPLICATE_API_TOKEN",
        },
        ProviderKind::Runway => KeyLocation {
            setting_key: "runway_api_key",
            env_var: "BB_RUNWAY_API_KEY",
        },
        ProviderKind::Akool => KeyLocation {
            setting_key: "akool_api_key",
            env_var: "BB_AKOOL_API_KEY",
        },
    }
}

fn toml_key(kind: ProviderKind, providers: &ProvidersConfig) -> Option<&String> {
    match kind {
        ProviderKind::Replicate => providers.replicate_api_token.as_ref(),
        ProviderKind::Runway => providers.runway_api_key.as_ref(),
        ProviderKind::Akool => providers.akool_api_key.as_ref(),
    }
}

fn base_url_override(kind: ProviderKind, providers: &ProvidersConfig) -> Option<&String> {
    match kind {
        ProviderKind::Replicate => providers.replicate_base_url.as_ref(),
        ProviderKind::Runway => providers.runway_base_url.as_ref(),
        ProviderKind::Akool => providers.akool_base_url.as_ref(),
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Pick the highest-priority valid key, returning it with its source name
pub fn pick_key(
    kind: ProviderKind,
    db_key: Option<String>,
    env_key: Option<String>,
    toml_key: Option<String>,
) -> Option<(String, &'static str)> {
    let candidates = [
        (db_key, "database"),
        (env_key, "environment"),
        (toml_key, "TOML"),
    ];

    let valid: Vec<(String, &'static str)> = candidates
        .into_iter()
        .filter_map(|(key, source)| key.filter(|k| is_valid_key(k)).map(|k| (k.trim().to_string(), source)))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(_, s)| *s).collect();
        warn!(
            "{} API key found in multiple sources: {}. Using {} (highest priority).",
            kind,
            sources.join(", "),
            sources[0]
        );
    }

    valid.into_iter().next()
}

/// Resolve one provider's API key from all three tiers
pub async fn resolve_provider_key(
    db: &SqlitePool,
    kind: ProviderKind,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let location = key_location(kind);
    let db_key = get_setting(db, location.setting_key).await?;
    let env_key = std::env::var(location.env_var).ok();
    let toml_value = toml_key(kind, &toml_config.providers).cloned();

    Ok(pick_key(kind, db_key, env_key, toml_value).map(|(key, source)| {
        info!("{} API key loaded from {}", kind, source);
        key
    }))
}

/// Build clients for every provider with a resolvable key
pub async fn build_provider_registry(
    db: &SqlitePool,
    toml_config: &TomlConfig,
) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    let overrides = &toml_config.providers;

    for kind in ProviderKind::ALL {
        let Some(key) = resolve_provider_key(db, kind, toml_config).await? else {
            info!(
                "{} not configured (set {} or providers.{} to enable)",
                kind,
                key_location(kind).env_var,
                key_location(kind).setting_key
            );
            continue;
        };

        let client_error =
            |e: crate::providers::ProviderError| Error::Config(format!("{} client: {}", kind, e));
        let base_url = base_url_override(kind, overrides);

        match kind {
            ProviderKind::Replicate => {
                let mut provider = ReplicateProvider::new(key).map_err(client_error)?;
                if let Some(url) = base_url {
                    provider = provider.with_base_url(url.as_str());
                }
                registry.register(Arc::new(provider));
            }
            ProviderKind::Runway => {
                let mut provider = RunwayProvider::new(key).map_err(client_error)?;
                if let Some(url) = base_url {
                    provider = provider.with_base_url(url.as_str());
                }
                registry.register(Arc::new(provider));
            }
            ProviderKind::Akool => {
                let mut provider = AkoolProvider::new(key).map_err(client_error)?;
                if let Some(url) = base_url {
                    provider = provider.with_base_url(url.as_str());
                }
                registry.register(Arc::new(provider));
            }
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb_common::db::init_memory_database;
    use bb_common::db::settings::set_setting;

    #[test]
    fn test_priority_order() {
        let pick = |db: Option<&str>, env: Option<&str>, toml: Option<&str>| {
            pick_key(
                ProviderKind::Replicate,
                db.map(str::to_string),
                env.map(str::to_string),
                toml.map(str::to_string),
            )
        };

        assert_eq!(pick(Some("d"), Some("e"), Some("t")), Some(("d".into(), "database")));
        assert_eq!(pick(None, Some("e"), Some("t")), Some(("e".into(), "environment")));
        assert_eq!(pick(None, None, Some("t")), Some(("t".into(), "TOML")));
        assert_eq!(pick(Some("  "), None, Some("t")), Some(("t".into(), "TOML")));
        assert_eq!(pick(None, Some(""), None), None);
    }

    #[tokio::test]
    async fn test_registry_from_database_key() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "akool_api_key", "ak-123").await.unwrap();

        let mut toml = TomlConfig::default();
        toml.providers.runway_api_key = Some("rw-456".into());
        toml.providers.runway_base_url = Some("http://127.0.0.1:9/".into());

        let registry = build_provider_registry(&pool, &toml).await.unwrap();
        let configured = registry.configured();
        assert!(configured.contains(&ProviderKind::Akool));
        assert!(configured.contains(&ProviderKind::Runway));
    }
}
