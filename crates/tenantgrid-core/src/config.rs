//! tenantgrid.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantGridConfig {
    #[serde(default)]
    pub edge: EdgeConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub api_url: String,
    pub nlb_dns: String,
    pub vpc_link: String,
    pub tenant_id_claim: String,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.tenantgrid.local/prod".to_string(),
            nlb_dns: "tenantgrid-nlb.internal".to_string(),
            vpc_link: "vpclink-shared".to_string(),
            tenant_id_claim: "custom:tenantId".to_string(),
        }
    }
}

/// Which priority allocator the shared listener uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocatorKind {
    /// Uniform random draw, no occupancy check.
    #[default]
    Random,
    /// Lowest free priority.
    Sequential,
    /// Hash of tenant/service, probing past occupied slots.
    TenantHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub listener: String,
    pub allocator: AllocatorKind,
    pub max_attempts: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            listener: "shared-alb-listener".to_string(),
            allocator: AllocatorKind::Random,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Identity-provider reference substituted into `<USER_POOL_ID>`.
    pub user_pool_ref: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_pool_ref: "arn:aws:cognito-idp:us-east-1:000000000000:userpool/local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub data_dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/tenantgrid"),
        }
    }
}

impl TenantGridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TenantGridConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn db_path(&self) -> PathBuf {
        self.state.data_dir.join("tenantgrid.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: TenantGridConfig = toml::from_str("").unwrap();
        assert_eq!(config.routing.max_attempts, 3);
        assert_eq!(config.routing.allocator, AllocatorKind::Random);
        assert_eq!(config.edge.tenant_id_claim, "custom:tenantId");
    }

    #[test]
    fn parses_routing_section() {
        let toml_str = r#"
[routing]
listener = "alb-main"
allocator = "tenant-hash"
max_attempts = 5
"#;
        let config: TenantGridConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.routing.listener, "alb-main");
        assert_eq!(config.routing.allocator, AllocatorKind::TenantHash);
        assert_eq!(config.routing.max_attempts, 5);
    }

    #[test]
    fn roundtrips_through_toml() {
        let config = TenantGridConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("shared-alb-listener"));
        let back: TenantGridConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.db_path(), config.db_path());
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = TenantGridConfig::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.routing.listener, "shared-alb-listener");
    }
}
