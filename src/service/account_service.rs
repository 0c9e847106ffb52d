//! 账户服务
//!
//! 对外的账户操作：创建（纯派生）、入金、清空余额、查余额。
//! 账户不落库：地址随时可由口令重派生，账本是唯一持久层。

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::domain::address_codec;
use crate::domain::derivation::{Wallet, WalletDeriver};
use crate::error::CoreError;
use crate::service::tx_gateway::{TransactionGateway, TransactionOutcome};
use crate::utils::password::{derivation_path_for_index, parse_password};

pub struct AccountService {
    gateway: Arc<TransactionGateway>,
    deriver: Arc<WalletDeriver>,
    ledger_config: LedgerConfig,
}

impl AccountService {
    pub fn new(
        gateway: Arc<TransactionGateway>,
        deriver: Arc<WalletDeriver>,
        ledger_config: LedgerConfig,
    ) -> Self {
        Self {
            gateway,
            deriver,
            ledger_config,
        }
    }

    /// 从口令派生钱包
    fn wallet_from_password(&self, password: &str) -> Result<Wallet, CoreError> {
        let parsed = parse_password(password)?;
        let path = derivation_path_for_index(parsed.index);
        self.deriver.derive(&parsed.seed_hex, &path)
    }

    /// 平台资金钱包
    fn funding_wallet(&self) -> Result<Wallet, CoreError> {
        self.deriver.derive(
            &self.ledger_config.platform_seed,
            &derivation_path_for_index(self.ledger_config.funding_account_index),
        )
    }

    /// 创建账户：纯派生，返回账户地址，不触账本
    pub fn create(&self, password: &str) -> Result<String, CoreError> {
        let wallet = self.wallet_from_password(password)?;
        tracing::info!(address = %wallet.address, "Account derived");
        Ok(wallet.address.clone())
    }

    /// 入金：平台资金账户向目标地址转 XRP（drops），等待最终确认
    ///
    /// 目标账户不存在时，这笔支付同时完成账户创建（金额需覆盖准备金）。
    pub async fn deposit(
        &self,
        address: &str,
        drops: u64,
    ) -> Result<TransactionOutcome, CoreError> {
        if !address_codec::is_valid_classic_address(address) {
            return Err(CoreError::Validation(format!(
                "'{}' is not a valid classic address",
                address
            )));
        }
        if drops == 0 {
            return Err(CoreError::Validation("deposit amount must be positive".into()));
        }

        let funding = self.funding_wallet()?;

        let _guard = self.gateway.lock().await;
        let outcome = self.gateway.payment(&funding, address, drops).await?;

        tracing::info!(
            address = %address,
            drops = drops,
            hash = %outcome.hash,
            "Deposit applied"
        );
        Ok(outcome)
    }

    /// 清空余额：口令认证后，把 余额−(手续费+准备金) 转回平台资金账户
    pub async fn clear_balance(
        &self,
        address: &str,
        password: &str,
    ) -> Result<TransactionOutcome, CoreError> {
        let wallet = self.wallet_from_password(password)?;
        if wallet.address != address {
            return Err(CoreError::AddressMismatch {
                derived: wallet.address.clone(),
                asserted: address.to_string(),
            });
        }

        let funding = self.funding_wallet()?;

        let _guard = self.gateway.lock().await;
        self.gateway.clear_balance(&wallet, &funding.address).await
    }

    /// 查询余额（drops）
    pub async fn get_balance(&self, address: &str) -> Result<u64, CoreError> {
        if !address_codec::is_valid_classic_address(address) {
            return Err(CoreError::Validation(format!(
                "'{}' is not a valid classic address",
                address
            )));
        }
        let info = self.gateway.get_account_info(address).await?;
        Ok(info.balance)
    }
}
