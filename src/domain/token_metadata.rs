//! 代币元数据构建
//!
//! 仓单代币和债务代币共用同一个元数据外壳：JSON序列化后hex编码，
//! 作为发行交易的元数据字段上链，blob 不得超过 1024 字节。
//! 资产类别/子类别必须落在标准枚举集内。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::CoreError;

/// blob 大小上限（字节）
pub const METADATA_BLOB_LIMIT: usize = 1024;

/// 标准资产类别集合
pub const ASSET_CLASSES: &[&str] = &["rwa", "memes", "wrapped", "gaming", "defi", "other"];

/// 标准资产子类别集合
pub const ASSET_SUBCLASSES: &[&str] = &[
    "stablecoin",
    "commodity",
    "real_estate",
    "private_credit",
    "equity",
    "treasury",
    "credit",
    "other",
];

/// 元数据中的链接条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUrl {
    pub url: String,
    pub category: String,
    pub title: String,
}

/// 代币元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub ticker: String,
    pub name: String,
    pub desc: String,
    pub icon: String,
    pub asset_class: String,
    pub asset_subclass: String,
    pub issuer_name: String,
    #[serde(default)]
    pub urls: Vec<MetadataUrl>,
    #[serde(default)]
    pub additional_info: serde_json::Value,
}

/// 债务代币条款（写入 additional_info）
#[derive(Debug, Clone)]
pub struct DebtTerms {
    pub currency: String,
    pub notional: Decimal,
    pub annual_rate_percent: Decimal,
    pub term_days: u32,
    pub daily_interest: Decimal,
    pub originated_at: DateTime<Utc>,
    pub matures_at: DateTime<Utc>,
    pub borrower: String,
    pub lender: String,
    pub collateral_token_id: String,
}

impl TokenMetadata {
    /// 仓单代币元数据：固定身份字段 + 单据哈希引用
    pub fn warrant(name: &str, issuer_name: &str, document_hash: &str) -> Self {
        Self {
            ticker: "WRNT".into(),
            name: name.into(),
            desc: "Tokenized warehouse receipt backed by a real-world asset".into(),
            icon: String::new(),
            asset_class: "rwa".into(),
            asset_subclass: "commodity".into(),
            issuer_name: issuer_name.into(),
            urls: Vec::new(),
            additional_info: json!({ "document_hash": document_hash }),
        }
    }

    /// 债务代币元数据：固定身份字段 + 完整贷款条款
    pub fn debt(issuer_name: &str, terms: &DebtTerms) -> Self {
        Self {
            ticker: "DEBT".into(),
            name: format!("Loan against {}", terms.collateral_token_id),
            desc: "Debt obligation collateralized by a warehouse receipt token".into(),
            icon: String::new(),
            asset_class: "rwa".into(),
            asset_subclass: "private_credit".into(),
            issuer_name: issuer_name.into(),
            urls: Vec::new(),
            additional_info: json!({
                "currency": terms.currency,
                "notional": terms.notional.to_string(),
                "annual_rate_percent": terms.annual_rate_percent.to_string(),
                "term_days": terms.term_days,
                "daily_interest": terms.daily_interest.to_string(),
                "originated_at": terms.originated_at.to_rfc3339(),
                "matures_at": terms.matures_at.to_rfc3339(),
                "borrower": terms.borrower,
                "lender": terms.lender,
                "collateral_token_id": terms.collateral_token_id,
            }),
        }
    }

    /// 校验资产类别/子类别是否在标准集合内
    pub fn validate(&self) -> Result<(), CoreError> {
        if !ASSET_CLASSES.contains(&self.asset_class.as_str()) {
            return Err(CoreError::InvalidMetadata(format!(
                "asset_class '{}' not in {:?}",
                self.asset_class, ASSET_CLASSES
            )));
        }
        if !ASSET_SUBCLASSES.contains(&self.asset_subclass.as_str()) {
            return Err(CoreError::InvalidMetadata(format!(
                "asset_subclass '{}' not in {:?}",
                self.asset_subclass, ASSET_SUBCLASSES
            )));
        }
        Ok(())
    }

    /// 序列化并hex编码成上链blob
    pub fn to_blob(&self) -> Result<String, CoreError> {
        self.validate()?;

        let bytes = serde_json::to_vec(self)
            .map_err(|e| CoreError::InvalidMetadata(format!("serialization failed: {}", e)))?;
        let blob = hex::encode_upper(bytes);

        if blob.len() > METADATA_BLOB_LIMIT {
            return Err(CoreError::BlobTooLarge {
                size: blob.len(),
                limit: METADATA_BLOB_LIMIT,
            });
        }
        Ok(blob)
    }

    /// 从上链blob还原元数据
    pub fn from_blob(blob: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(blob)
            .map_err(|e| CoreError::Decode(format!("blob is not valid hex: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::Decode(format!("blob is not a metadata record: {}", e)))
    }
}
