//! Command line arguments.
//!
//! Precedence: flag or `OP_TXPROXY_*` environment variable, then config file,
//! then built-in defaults.

use crate::domain::config::{ConfigError, GatewayConfig};
use crate::domain::types::Address;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug, Default)]
#[command(name = "conditional-tx-gateway")]
#[command(author, version, about = "Admission gateway for conditional transactions", long_about = None)]
pub struct Args {
    /// TOML config file
    #[arg(long, env = "OP_TXPROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP listen address
    #[arg(long, env = "OP_TXPROXY_RPC_ADDR")]
    pub rpc_addr: Option<IpAddr>,

    /// HTTP listen port
    #[arg(long, env = "OP_TXPROXY_RPC_PORT")]
    pub rpc_port: Option<u16>,

    /// Enable eth_sendRawTransactionConditional
    #[arg(long, env = "OP_TXPROXY_SENDRAWTXCOND_ENABLED")]
    pub sendrawtxcond_enabled: Option<bool>,

    /// Backend receiving accepted conditionals
    #[arg(long, env = "OP_TXPROXY_SENDRAWTXCOND_BACKEND")]
    pub sendrawtxcond_backend: Option<String>,

    /// Burst capacity of the cost limiter
    #[arg(long, env = "OP_TXPROXY_SENDRAWTXCOND_RATELIMIT")]
    pub sendrawtxcond_ratelimit: Option<u32>,

    /// Additional permitted target contracts
    #[arg(
        long,
        env = "OP_TXPROXY_SENDRAWTXCOND_EXTRA_ENTRYPOINTS",
        value_delimiter = ',',
        value_parser = parse_address
    )]
    pub extra_entrypoints: Vec<Address>,

    /// Emit logs as JSON
    #[arg(long, env = "OP_TXPROXY_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    /// Load the config file (if any) and apply overrides on top.
    pub fn load_config(&self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::from_toml_file(path)?,
            None => GatewayConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(host) = self.rpc_addr {
            config.http.host = host;
        }
        if let Some(port) = self.rpc_port {
            config.http.port = port;
        }
        if let Some(enabled) = self.sendrawtxcond_enabled {
            config.conditional.enabled = enabled;
        }
        if let Some(backend) = &self.sendrawtxcond_backend {
            config.conditional.backend_url = backend.clone();
        }
        if let Some(capacity) = self.sendrawtxcond_ratelimit {
            config.rate_limit.capacity = capacity;
        }
        config
            .conditional
            .extra_entrypoints
            .extend(self.extra_entrypoints.iter().copied());
    }
}

fn parse_address(s: &str) -> Result<Address, String> {
    let s = s.trim();
    let hex_part = s.strip_prefix("0x").unwrap_or(s);
    if hex_part.len() != 40 {
        return Err(format!("expected 20-byte hex address, got {:?}", s));
    }
    Address::from_str(hex_part).map_err(|e| e.to_string())
}
