//! Blocksync configuration parsing and validation.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use blocksync_common_types::inputs::BlockRange;
use blocksync_common_types::{Address, BlockNumber};
use serde::{Deserialize, Serialize};

/// A [`serde`]-compatible representation of Blocksync's YAML configuration
/// file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// The URL of the PostgreSQL database to use.
    pub database_url: String,
    /// How long to wait between two backfill passes.
    #[serde(default = "Config::default_polling_period_in_seconds")]
    pub polling_period_in_seconds: u64,
    /// The tokens whose supply is backfilled for every known block.
    #[serde(default)]
    pub token_supply: Vec<TokenSupplyConfig>,
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open config file {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(file).context("invalid config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for token in &self.token_supply {
            token.validate()?;
        }
        Ok(())
    }

    pub fn polling_period(&self) -> Duration {
        Duration::from_secs(self.polling_period_in_seconds)
    }

    fn default_polling_period_in_seconds() -> u64 {
        120
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSupplyConfig {
    /// Must be in canonical form, i.e. lowercase and `0x`-prefixed.
    pub token_address: String,
    pub start_block: BlockNumber,
    /// Leave it out to keep up with the chain head.
    #[serde(default)]
    pub end_block: Option<BlockNumber>,
}

impl TokenSupplyConfig {
    pub fn block_range(&self) -> BlockRange {
        BlockRange {
            start: Some(self.start_block),
            end: self.end_block,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        let address = Address::parse_fixed(&self.token_address)
            .map_err(|e| anyhow::anyhow!("invalid token address {:?}: {e}", self.token_address))?;
        anyhow::ensure!(
            address.to_string() == self.token_address,
            "token address {:?} is not in canonical form, use {address}",
            self.token_address
        );
        if let Some(end_block) = self.end_block {
            anyhow::ensure!(
                self.start_block <= end_block,
                "token {} has start block {} after end block {end_block}",
                self.token_address,
                self.start_block
            );
        }
        Ok(())
    }
}
