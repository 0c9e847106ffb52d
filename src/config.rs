//! 配置管理模块
//! 支持从环境变量和配置文件加载配置
//!
//! 贷款条款是版本内固定默认值（principal/利率/计息周期），
//! 部署只覆盖账本端点和平台种子。

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub loan: LoanConfig,
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// 账本配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// rippled JSON-RPC 端点
    pub rpc_url: String,
    /// 平台hex种子（资金账户与放贷账户都从它派生）
    pub platform_seed: String,
    /// 资金账户派生索引（XRP出资方）
    pub funding_account_index: u32,
    /// 放贷账户派生索引（稳定币发行方 + 债务代币铸造方）
    pub lending_account_index: u32,
    /// 放贷账户首次注资金额（drops）
    pub lending_account_funding_drops: u64,
    /// 等待最终确认的超时（秒）
    pub finality_timeout_secs: u64,
    /// 最终确认轮询间隔（毫秒）
    pub poll_interval_ms: u64,
}

/// 贷款条款配置（版本内固定默认值）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanConfig {
    /// 本金（稳定币单位）
    pub principal: Decimal,
    /// 年利率（百分比）
    pub annual_rate_percent: Decimal,
    /// 计息周期（秒）
    pub accrual_period_secs: u64,
    /// 计息任务轮询间隔（秒）
    pub accrual_tick_secs: u64,
    /// 信任线额度倍数（相对本金）
    pub trustline_factor: u32,
    /// 贷款期限（天），写入债务代币元数据
    pub term_days: u32,
    /// 稳定币货币代码
    pub currency: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into()),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("LEDGER_RPC_URL")
                .unwrap_or_else(|_| "https://s.altnet.rippletest.net:51234".into()),
            platform_seed: std::env::var("PLATFORM_SEED").unwrap_or_default(),
            funding_account_index: std::env::var("FUNDING_ACCOUNT_INDEX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            lending_account_index: std::env::var("LENDING_ACCOUNT_INDEX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            lending_account_funding_drops: std::env::var("LENDING_ACCOUNT_FUNDING_DROPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100_000_000), // 100 XRP
            finality_timeout_secs: std::env::var("FINALITY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            poll_interval_ms: std::env::var("FINALITY_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        }
    }
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            principal: std::env::var("LOAN_PRINCIPAL")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .unwrap_or_else(|| Decimal::from(100)),
            annual_rate_percent: std::env::var("LOAN_ANNUAL_RATE_PERCENT")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .unwrap_or_else(|| Decimal::from(10)),
            accrual_period_secs: std::env::var("LOAN_ACCRUAL_PERIOD_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(86_400), // 一天
            accrual_tick_secs: std::env::var("LOAN_ACCRUAL_TICK_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            trustline_factor: std::env::var("LOAN_TRUSTLINE_FACTOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            term_days: std::env::var("LOAN_TERM_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(365),
            currency: std::env::var("LOAN_CURRENCY").unwrap_or_else(|_| "USD".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::default(),
            ledger: LedgerConfig::default(),
            loan: LoanConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                let file_config = Self::from_file(path)?;
                config = file_config;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.ledger.rpc_url.starts_with("http://") && !self.ledger.rpc_url.starts_with("https://")
        {
            anyhow::bail!("LEDGER_RPC_URL must start with http:// or https://");
        }

        if self.ledger.platform_seed.is_empty() {
            anyhow::bail!("PLATFORM_SEED must be set");
        }
        if hex::decode(&self.ledger.platform_seed).is_err() {
            anyhow::bail!("PLATFORM_SEED must be a hex string");
        }
        if self.ledger.funding_account_index == self.ledger.lending_account_index {
            anyhow::bail!("FUNDING_ACCOUNT_INDEX and LENDING_ACCOUNT_INDEX must differ");
        }

        if self.loan.principal <= Decimal::ZERO {
            anyhow::bail!("LOAN_PRINCIPAL must be positive");
        }
        if self.loan.accrual_period_secs == 0 || self.loan.accrual_tick_secs == 0 {
            anyhow::bail!("accrual period and tick must be positive");
        }
        // 货币代码：标准3字符代码
        if self.loan.currency.len() != 3 {
            anyhow::bail!("LOAN_CURRENCY must be a 3-character currency code");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}
