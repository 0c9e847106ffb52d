//! 交易提交网关
//!
//! 包一层账本客户端：一把独占锁 + 费用/准备金策略 + 提交后等待最终确认 +
//! 代币铸造/授权/转移/销毁原语。
//! 账本对同一账户强制序列号严格递增，所有持锁提交因此被全序化；
//! 多步操作的调用方必须在整个操作期间持有锁。

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::address_codec;
use crate::domain::derivation::Wallet;
use crate::domain::token_metadata::TokenMetadata;
use crate::error::CoreError;
use crate::infrastructure::ledger_rpc::{decode_numeric, AccountInfo, FeeAndReserve, LedgerApi};

/// 账本成功码
pub const ENGINE_RESULT_SUCCESS: &str = "tesSUCCESS";
/// 发行ID长度（hex字符）：4字节序列号 + 20字节账户ID
pub const ISSUANCE_ID_HEX_LEN: usize = 48;
/// 代币可转让标志
const MPT_CAN_TRANSFER: u32 = 0x0000_0020;
/// 手续费余量倍数：基础费 × 1.2
const FEE_MARGIN_NUM: u64 = 12;
const FEE_MARGIN_DEN: u64 = 10;

/// 交易在账本上到达“已应用”状态后的结果
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub hash: String,
    pub sequence: u32,
}

/// 铸造结果
#[derive(Debug, Clone)]
pub struct MintOutcome {
    pub hash: String,
    pub issuance_id: String,
}

/// 交易提交网关
pub struct TransactionGateway {
    client: Arc<dyn LedgerApi>,
    submit_lock: Arc<Mutex<()>>,
    finality_timeout: Duration,
    poll_interval: Duration,
}

impl TransactionGateway {
    pub fn new(
        client: Arc<dyn LedgerApi>,
        finality_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            submit_lock: Arc::new(Mutex::new(())),
            finality_timeout,
            poll_interval,
        }
    }

    /// 获取独占提交锁
    ///
    /// 返回持有型守卫；多步操作全程持有，防止并发提交用到过期序列号。
    pub async fn lock(&self) -> OwnedMutexGuard<()> {
        self.submit_lock.clone().lock_owned().await
    }

    /// 查询基础费与准备金
    pub async fn get_fee_and_reserve(&self) -> Result<FeeAndReserve, CoreError> {
        self.client.get_fee_and_reserve().await
    }

    /// 查询账户信息
    pub async fn get_account_info(&self, address: &str) -> Result<AccountInfo, CoreError> {
        self.client.get_account_info(address).await
    }

    /// 提交交易，返回交易哈希
    pub async fn submit_tx(&self, wallet: &Wallet, tx: &Value) -> Result<String, CoreError> {
        self.submit_tx_with_sequence(wallet, tx)
            .await
            .map(|outcome| outcome.hash)
    }

    /// 提交交易，返回哈希和账本分配的序列号
    pub async fn submit_tx_with_sequence(
        &self,
        wallet: &Wallet,
        tx: &Value,
    ) -> Result<TransactionOutcome, CoreError> {
        if wallet.address.is_empty() || wallet.secret.is_empty() {
            return Err(CoreError::Validation(
                "wallet is missing address or secret".into(),
            ));
        }
        let fields = tx
            .as_object()
            .ok_or_else(|| CoreError::Validation("transaction must be a JSON object".into()))?;
        if fields.is_empty() {
            return Err(CoreError::Validation("transaction has no fields".into()));
        }

        let result = self.client.submit(&wallet.secret, tx.clone()).await?;

        let engine_result = result
            .get("engine_result")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::Response("submit response missing engine_result".into()))?;

        if engine_result != ENGINE_RESULT_SUCCESS {
            tracing::warn!(
                engine_result = %engine_result,
                tx_type = tx.get("TransactionType").and_then(|t| t.as_str()).unwrap_or("?"),
                account = %wallet.address,
                "Ledger rejected transaction"
            );
            return Err(CoreError::Submission {
                code: engine_result.to_string(),
            });
        }

        let echoed = result
            .get("tx_json")
            .ok_or_else(|| CoreError::Response("submit response missing tx_json".into()))?;

        let hash = echoed
            .get("hash")
            .and_then(|v| v.as_str())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CoreError::Response("submit response missing transaction hash".into()))?
            .to_string();

        // 序列号可能以整数/浮点/数字字符串出现
        let sequence = echoed
            .get("Sequence")
            .and_then(decode_numeric)
            .ok_or_else(|| {
                CoreError::SequenceExtraction(format!(
                    "tx_json.Sequence missing or non-numeric: {:?}",
                    echoed.get("Sequence")
                ))
            })?;

        tracing::info!(
            hash = %hash,
            sequence = sequence,
            tx_type = tx.get("TransactionType").and_then(|t| t.as_str()).unwrap_or("?"),
            account = %wallet.address,
            "Transaction accepted"
        );

        Ok(TransactionOutcome {
            hash,
            sequence: sequence as u32,
        })
    }

    /// 提交交易并阻塞到账本最终确认
    pub async fn submit_tx_and_wait(
        &self,
        wallet: &Wallet,
        tx: &Value,
    ) -> Result<TransactionOutcome, CoreError> {
        let outcome = self.submit_tx_with_sequence(wallet, tx).await?;
        self.wait_for_finality(&outcome.hash).await?;
        Ok(outcome)
    }

    /// 轮询交易直到 validated 或超时
    async fn wait_for_finality(&self, hash: &str) -> Result<(), CoreError> {
        let deadline = tokio::time::Instant::now() + self.finality_timeout;

        loop {
            tokio::time::sleep(self.poll_interval).await;

            match self.client.lookup_tx(hash).await {
                Ok(result) => {
                    let validated = result
                        .get("validated")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                    if validated {
                        // 最终结果以 meta 为准
                        if let Some(meta_result) = result
                            .get("meta")
                            .and_then(|m| m.get("TransactionResult"))
                            .and_then(|r| r.as_str())
                        {
                            if meta_result != ENGINE_RESULT_SUCCESS {
                                return Err(CoreError::Submission {
                                    code: meta_result.to_string(),
                                });
                            }
                        }
                        return Ok(());
                    }
                }
                // 交易可能还没进入任何账本视图
                Err(CoreError::NotFound(_)) => {}
                Err(other) => return Err(other),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(CoreError::Timeout(format!(
                    "transaction {} not validated within {:?}",
                    hash, self.finality_timeout
                )));
            }
        }
    }

    /// 原生币支付（drops）
    pub async fn payment(
        &self,
        from: &Wallet,
        to: &str,
        drops: u64,
    ) -> Result<TransactionOutcome, CoreError> {
        let tx = json!({
            "TransactionType": "Payment",
            "Account": from.address,
            "Destination": to,
            "Amount": drops.to_string(),
        });
        self.submit_tx_and_wait(from, &tx).await
    }

    /// 发行币支付
    pub async fn payment_issued(
        &self,
        from: &Wallet,
        to: &str,
        currency: &str,
        issuer: &str,
        value: Decimal,
    ) -> Result<TransactionOutcome, CoreError> {
        let tx = json!({
            "TransactionType": "Payment",
            "Account": from.address,
            "Destination": to,
            "Amount": {
                "currency": currency,
                "issuer": issuer,
                "value": value.to_string(),
            },
        });
        self.submit_tx_and_wait(from, &tx).await
    }

    /// 开信任线（holder 授权持有 issuer 的发行币，额度 limit）
    pub async fn create_trustline(
        &self,
        holder: &Wallet,
        currency: &str,
        issuer: &str,
        limit: Decimal,
    ) -> Result<TransactionOutcome, CoreError> {
        let tx = json!({
            "TransactionType": "TrustSet",
            "Account": holder.address,
            "LimitAmount": {
                "currency": currency,
                "issuer": issuer,
                "value": limit.to_string(),
            },
        });
        self.submit_tx_and_wait(holder, &tx).await
    }

    /// 铸造受限代币
    ///
    /// 发行ID = 大端hex(序列号) ‖ hex(发行方20字节账户ID)，恰好48个hex字符。
    pub async fn mint_token(
        &self,
        wallet: &Wallet,
        metadata: &TokenMetadata,
        max_amount: u64,
        transfer_fee: u32,
    ) -> Result<MintOutcome, CoreError> {
        let blob = metadata.to_blob()?;

        let tx = json!({
            "TransactionType": "MPTokenIssuanceCreate",
            "Account": wallet.address,
            "MaximumAmount": max_amount.to_string(),
            "TransferFee": transfer_fee,
            "MPTokenMetadata": blob,
            "Flags": MPT_CAN_TRANSFER,
        });

        let outcome = self.submit_tx_and_wait(wallet, &tx).await?;

        let account_id = address_codec::decode_classic_address(&wallet.address)?;
        let issuance_id = format!(
            "{:08X}{}",
            outcome.sequence,
            hex::encode_upper(account_id)
        );

        tracing::info!(
            issuance_id = %issuance_id,
            issuer = %wallet.address,
            "Token minted"
        );

        Ok(MintOutcome {
            hash: outcome.hash,
            issuance_id,
        })
    }

    /// 持有人授权接收某发行的代币
    pub async fn authorize_token(
        &self,
        holder: &Wallet,
        issuance_id: &str,
    ) -> Result<TransactionOutcome, CoreError> {
        let tx = json!({
            "TransactionType": "MPTokenAuthorize",
            "Account": holder.address,
            "MPTokenIssuanceID": issuance_id,
        });
        self.submit_tx_and_wait(holder, &tx).await
    }

    /// 代币转移
    pub async fn transfer_token(
        &self,
        from: &Wallet,
        to: &str,
        issuance_id: &str,
        amount: u64,
    ) -> Result<TransactionOutcome, CoreError> {
        let tx = json!({
            "TransactionType": "Payment",
            "Account": from.address,
            "Destination": to,
            "Amount": {
                "mpt_issuance_id": issuance_id,
                "value": amount.to_string(),
            },
        });
        self.submit_tx_and_wait(from, &tx).await
    }

    /// 销毁发行（外部持有余额未清时账本会拒绝）
    pub async fn destroy_token(
        &self,
        issuer: &Wallet,
        issuance_id: &str,
    ) -> Result<TransactionOutcome, CoreError> {
        let tx = json!({
            "TransactionType": "MPTokenIssuanceDestroy",
            "Account": issuer.address,
            "MPTokenIssuanceID": issuance_id,
        });
        self.submit_tx_and_wait(issuer, &tx).await
    }

    /// 从发行ID反解发行方经典地址
    pub fn resolve_issuer_address(&self, issuance_id: &str) -> Result<String, CoreError> {
        if issuance_id.len() != ISSUANCE_ID_HEX_LEN
            || !issuance_id.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(CoreError::Validation(format!(
                "issuance id must be exactly {} hex characters",
                ISSUANCE_ID_HEX_LEN
            )));
        }

        let account_hex = &issuance_id[8..];
        let bytes = hex::decode(account_hex)
            .map_err(|e| CoreError::Validation(format!("issuance id not hex: {}", e)))?;
        let mut account_id = [0u8; 20];
        account_id.copy_from_slice(&bytes);

        Ok(address_codec::encode_account_id(&account_id))
    }

    /// 清算门槛：基础费×1.2 + 基础准备金 + 增量准备金
    pub fn required_clearance(fees: &FeeAndReserve) -> u64 {
        fees.base_fee * FEE_MARGIN_NUM / FEE_MARGIN_DEN + fees.reserve_base + fees.reserve_increment
    }

    /// 清空余额：把 余额 −（手续费+准备金）全部转给 destination
    ///
    /// 余额不超过清算门槛时拒绝。
    pub async fn clear_balance(
        &self,
        wallet: &Wallet,
        destination: &str,
    ) -> Result<TransactionOutcome, CoreError> {
        let fees = self.get_fee_and_reserve().await?;
        let info = self.get_account_info(&wallet.address).await?;

        let required = Self::required_clearance(&fees);
        if info.balance <= required {
            return Err(CoreError::InsufficientFunds {
                balance: info.balance,
                required,
            });
        }

        let amount = info.balance - required;
        tracing::info!(
            account = %wallet.address,
            destination = %destination,
            amount_drops = amount,
            "Clearing account balance"
        );
        self.payment(wallet, destination, amount).await
    }
}
