//! 贷款生命周期工作流
//!
//! 抵押代币的状态机：{仓单在借款人, 在出借人, 回仓库} × {无贷款, 有贷款}。
//! 每个迁移在网关锁内完整执行；各方身份通过
//! `<hexSeed>-<index>` 口令重派生并与声称地址比对来认证。
//! 多步操作不做补偿：第一处失败立即带步骤名上抛，
//! 已上链的前序效果留待人工对账（已记录的产品约束）。

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::{LedgerConfig, LoanConfig};
use crate::domain::derivation::{Wallet, WalletDeriver};
use crate::domain::loan::Loan;
use crate::domain::token_metadata::{DebtTerms, TokenMetadata};
use crate::error::CoreError;
use crate::service::loan_registry::LoanRegistry;
use crate::service::tx_gateway::{TransactionGateway, TransactionOutcome};
use crate::utils::password::{derivation_path_for_index, parse_password};

/// 债务代币元数据中的发行方名称
const DEBT_ISSUER_NAME: &str = "Warrant Lending Desk";
/// 仓单/债务代币均为单枚
const TOKEN_UNIT: u64 = 1;

/// 一方的认证材料：声称地址 + 派生口令
#[derive(Debug, Clone)]
pub struct PartyCredentials {
    pub address: String,
    pub password: String,
}

/// 贷款工作流编排器
pub struct LoanWorkflow {
    gateway: Arc<TransactionGateway>,
    registry: Arc<LoanRegistry>,
    deriver: Arc<WalletDeriver>,
    loan_config: LoanConfig,
    ledger_config: LedgerConfig,
}

impl LoanWorkflow {
    pub fn new(
        gateway: Arc<TransactionGateway>,
        registry: Arc<LoanRegistry>,
        deriver: Arc<WalletDeriver>,
        loan_config: LoanConfig,
        ledger_config: LedgerConfig,
    ) -> Self {
        Self {
            gateway,
            registry,
            deriver,
            loan_config,
            ledger_config,
        }
    }

    /// 口令重派生认证：派生地址必须等于声称地址
    pub fn authenticate(&self, credentials: &PartyCredentials) -> Result<Wallet, CoreError> {
        let parsed = parse_password(&credentials.password)?;
        let path = derivation_path_for_index(parsed.index);
        let wallet = self.deriver.derive(&parsed.seed_hex, &path)?;

        if wallet.address != credentials.address {
            return Err(CoreError::AddressMismatch {
                derived: wallet.address.clone(),
                asserted: credentials.address.clone(),
            });
        }
        Ok(wallet)
    }

    /// 平台资金钱包（XRP出资方）
    fn funding_wallet(&self) -> Result<Wallet, CoreError> {
        self.deriver.derive(
            &self.ledger_config.platform_seed,
            &derivation_path_for_index(self.ledger_config.funding_account_index),
        )
    }

    /// 平台放贷钱包（稳定币发行方 + 债务代币铸造方）
    pub fn lending_wallet(&self) -> Result<Wallet, CoreError> {
        self.deriver.derive(
            &self.ledger_config.platform_seed,
            &derivation_path_for_index(self.ledger_config.lending_account_index),
        )
    }

    /// 放贷账户不存在时从资金账户注资创建
    async fn ensure_lending_account(
        &self,
        funding: &Wallet,
        lending: &Wallet,
    ) -> Result<(), CoreError> {
        match self.gateway.get_account_info(&lending.address).await {
            Ok(_) => Ok(()),
            Err(CoreError::NotFound(_)) => {
                tracing::info!(
                    lending = %lending.address,
                    drops = self.ledger_config.lending_account_funding_drops,
                    "Lending account missing, funding it"
                );
                self.gateway
                    .payment(
                        funding,
                        &lending.address,
                        self.ledger_config.lending_account_funding_drops,
                    )
                    .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// 授权失败不阻断流程：授权可能早已存在，记日志后照常尝试转移
    async fn try_authorize(&self, holder: &Wallet, issuance_id: &str, step: &'static str) {
        if let Err(e) = self.gateway.authorize_token(holder, issuance_id).await {
            tracing::warn!(
                step = step,
                holder = %holder.address,
                issuance_id = %issuance_id,
                error = %e,
                "Token authorization failed, attempting transfer anyway"
            );
        }
    }

    /// 仓单移交出借人（无贷款）
    pub async fn issue_to_creditor(
        &self,
        token_id: &str,
        owner: &PartyCredentials,
        creditor: &PartyCredentials,
    ) -> Result<TransactionOutcome, CoreError> {
        let op_id = Uuid::new_v4();
        tracing::info!(op_id = %op_id, token_id = %token_id, "issue_to_creditor started");

        let _guard = self.gateway.lock().await;

        let owner_wallet = self
            .authenticate(owner)
            .map_err(|e| e.at_step("authenticate-owner"))?;
        let creditor_wallet = self
            .authenticate(creditor)
            .map_err(|e| e.at_step("authenticate-creditor"))?;

        self.try_authorize(&creditor_wallet, token_id, "authorize-warrant")
            .await;

        let outcome = self
            .gateway
            .transfer_token(&owner_wallet, &creditor_wallet.address, token_id, TOKEN_UNIT)
            .await
            .map_err(|e| e.at_step("warrant-transfer"))?;

        tracing::info!(op_id = %op_id, hash = %outcome.hash, "issue_to_creditor completed");
        Ok(outcome)
    }

    /// 仓单移交出借人并放款
    ///
    /// 步骤：初始化放贷账户 → 双方开信任线（本金×10） →
    /// 平台给借款人铺底（本金/10）、给出借人放款准备金（本金） →
    /// 铸造债务代币 → 出借人收债务代币和仓单 → 出借人付足额本金给借款人 →
    /// 登记贷款。
    pub async fn issue_to_creditor_with_loan(
        &self,
        token_id: &str,
        owner: &PartyCredentials,
        creditor: &PartyCredentials,
    ) -> Result<TransactionOutcome, CoreError> {
        let op_id = Uuid::new_v4();
        tracing::info!(op_id = %op_id, token_id = %token_id, "issue_to_creditor_with_loan started");

        let _guard = self.gateway.lock().await;

        let owner_wallet = self
            .authenticate(owner)
            .map_err(|e| e.at_step("authenticate-owner"))?;
        let creditor_wallet = self
            .authenticate(creditor)
            .map_err(|e| e.at_step("authenticate-creditor"))?;

        if self.registry.get_loan(token_id).await.is_ok() {
            return Err(CoreError::Validation(format!(
                "loan already registered for token {}",
                token_id
            ))
            .at_step("check-existing-loan"));
        }

        let funding = self
            .funding_wallet()
            .map_err(|e| e.at_step("derive-platform-wallets"))?;
        let lending = self
            .lending_wallet()
            .map_err(|e| e.at_step("derive-platform-wallets"))?;

        self.ensure_lending_account(&funding, &lending)
            .await
            .map_err(|e| e.at_step("init-lending-account"))?;

        let principal = self.loan_config.principal;
        let currency = self.loan_config.currency.clone();
        let trustline_limit = principal * Decimal::from(self.loan_config.trustline_factor);

        self.gateway
            .create_trustline(&owner_wallet, &currency, &lending.address, trustline_limit)
            .await
            .map_err(|e| e.at_step("owner-trustline"))?;
        self.gateway
            .create_trustline(&creditor_wallet, &currency, &lending.address, trustline_limit)
            .await
            .map_err(|e| e.at_step("creditor-trustline"))?;

        // 铺底资金：借款人拿本金的十分之一作周转，出借人拿足额本金用于放款
        self.gateway
            .payment_issued(
                &lending,
                &owner_wallet.address,
                &currency,
                &lending.address,
                principal / Decimal::from(10),
            )
            .await
            .map_err(|e| e.at_step("seed-fund-owner"))?;
        self.gateway
            .payment_issued(
                &lending,
                &creditor_wallet.address,
                &currency,
                &lending.address,
                principal,
            )
            .await
            .map_err(|e| e.at_step("seed-fund-creditor"))?;

        let now = Utc::now();
        let terms = DebtTerms {
            currency: currency.clone(),
            notional: principal,
            annual_rate_percent: self.loan_config.annual_rate_percent,
            term_days: self.loan_config.term_days,
            daily_interest: principal * self.loan_config.annual_rate_percent
                / Decimal::from(36_500),
            originated_at: now,
            matures_at: now + ChronoDuration::days(self.loan_config.term_days as i64),
            borrower: owner_wallet.address.clone(),
            lender: creditor_wallet.address.clone(),
            collateral_token_id: token_id.to_string(),
        };
        let metadata = TokenMetadata::debt(DEBT_ISSUER_NAME, &terms);

        let mint = self
            .gateway
            .mint_token(&lending, &metadata, TOKEN_UNIT, 0)
            .await
            .map_err(|e| e.at_step("mint-debt-token"))?;

        self.try_authorize(&creditor_wallet, &mint.issuance_id, "authorize-debt")
            .await;
        self.gateway
            .transfer_token(&lending, &creditor_wallet.address, &mint.issuance_id, TOKEN_UNIT)
            .await
            .map_err(|e| e.at_step("debt-transfer"))?;

        self.try_authorize(&creditor_wallet, token_id, "authorize-warrant")
            .await;
        self.gateway
            .transfer_token(&owner_wallet, &creditor_wallet.address, token_id, TOKEN_UNIT)
            .await
            .map_err(|e| e.at_step("warrant-transfer"))?;

        // 放款：出借人把足额本金付给借款人
        let disbursement = self
            .gateway
            .payment_issued(
                &creditor_wallet,
                &owner_wallet.address,
                &currency,
                &lending.address,
                principal,
            )
            .await
            .map_err(|e| e.at_step("principal-disbursement"))?;

        let accrual_period = ChronoDuration::seconds(self.loan_config.accrual_period_secs as i64);
        let loan = Loan {
            principal,
            annual_rate_percent: self.loan_config.annual_rate_percent,
            accrual_period,
            next_payment: now + accrual_period,
            owner_wallet: owner_wallet.clone(),
            creditor_wallet: creditor_wallet.clone(),
            currency,
            debt_token_id: mint.issuance_id.clone(),
        };
        self.registry
            .add_loan(token_id, loan)
            .await
            .map_err(|e| e.at_step("register-loan"))?;

        tracing::info!(
            op_id = %op_id,
            token_id = %token_id,
            debt_token_id = %mint.issuance_id,
            hash = %disbursement.hash,
            "issue_to_creditor_with_loan completed"
        );
        Ok(disbursement)
    }

    /// 借款人买回仓单（无贷款）
    pub async fn buyout_from_creditor(
        &self,
        token_id: &str,
        owner: &PartyCredentials,
        creditor: &PartyCredentials,
    ) -> Result<TransactionOutcome, CoreError> {
        let op_id = Uuid::new_v4();
        tracing::info!(op_id = %op_id, token_id = %token_id, "buyout_from_creditor started");

        let _guard = self.gateway.lock().await;

        let owner_wallet = self
            .authenticate(owner)
            .map_err(|e| e.at_step("authenticate-owner"))?;
        let creditor_wallet = self
            .authenticate(creditor)
            .map_err(|e| e.at_step("authenticate-creditor"))?;

        self.try_authorize(&owner_wallet, token_id, "authorize-warrant")
            .await;

        let outcome = self
            .gateway
            .transfer_token(&creditor_wallet, &owner_wallet.address, token_id, TOKEN_UNIT)
            .await
            .map_err(|e| e.at_step("warrant-return"))?;

        tracing::info!(op_id = %op_id, hash = %outcome.hash, "buyout_from_creditor completed");
        Ok(outcome)
    }

    /// 借款人买断贷款并赎回仓单
    ///
    /// 借款人足额还本 → 债务代币回流并销毁 → 仓单回借款人 → 注销贷款。
    pub async fn buyout_from_creditor_with_loan(
        &self,
        token_id: &str,
        owner: &PartyCredentials,
        creditor: &PartyCredentials,
    ) -> Result<TransactionOutcome, CoreError> {
        let op_id = Uuid::new_v4();
        tracing::info!(op_id = %op_id, token_id = %token_id, "buyout_from_creditor_with_loan started");

        let _guard = self.gateway.lock().await;

        let owner_wallet = self
            .authenticate(owner)
            .map_err(|e| e.at_step("authenticate-owner"))?;
        let creditor_wallet = self
            .authenticate(creditor)
            .map_err(|e| e.at_step("authenticate-creditor"))?;

        let loan = self
            .registry
            .get_loan(token_id)
            .await
            .map_err(|e| e.at_step("load-loan"))?;

        // 声称的双方必须就是贷款登记的双方
        if loan.owner_wallet.address != owner_wallet.address {
            return Err(CoreError::AddressMismatch {
                derived: owner_wallet.address.clone(),
                asserted: loan.owner_wallet.address.clone(),
            }
            .at_step("verify-loan-parties"));
        }
        if loan.creditor_wallet.address != creditor_wallet.address {
            return Err(CoreError::AddressMismatch {
                derived: creditor_wallet.address.clone(),
                asserted: loan.creditor_wallet.address.clone(),
            }
            .at_step("verify-loan-parties"));
        }

        let lending = self
            .lending_wallet()
            .map_err(|e| e.at_step("derive-platform-wallets"))?;

        self.gateway
            .payment_issued(
                &owner_wallet,
                &creditor_wallet.address,
                &loan.currency,
                &lending.address,
                loan.principal,
            )
            .await
            .map_err(|e| e.at_step("principal-repayment"))?;

        self.gateway
            .transfer_token(
                &creditor_wallet,
                &lending.address,
                &loan.debt_token_id,
                TOKEN_UNIT,
            )
            .await
            .map_err(|e| e.at_step("debt-return"))?;
        self.gateway
            .destroy_token(&lending, &loan.debt_token_id)
            .await
            .map_err(|e| e.at_step("debt-destroy"))?;

        self.try_authorize(&owner_wallet, token_id, "authorize-warrant")
            .await;
        let outcome = self
            .gateway
            .transfer_token(&creditor_wallet, &owner_wallet.address, token_id, TOKEN_UNIT)
            .await
            .map_err(|e| e.at_step("warrant-return"))?;

        self.registry
            .remove_loan(token_id)
            .await
            .map_err(|e| e.at_step("deregister-loan"))?;

        tracing::info!(op_id = %op_id, hash = %outcome.hash, "buyout_from_creditor_with_loan completed");
        Ok(outcome)
    }

    /// 仓单回仓库赎回（无贷款）
    ///
    /// 仓库地址直接从仓单发行ID反解：仓单的发行方就是仓库。
    pub async fn transfer_to_warehouse(
        &self,
        token_id: &str,
        creditor: &PartyCredentials,
    ) -> Result<TransactionOutcome, CoreError> {
        let op_id = Uuid::new_v4();
        tracing::info!(op_id = %op_id, token_id = %token_id, "transfer_to_warehouse started");

        let _guard = self.gateway.lock().await;

        let warehouse = self
            .gateway
            .resolve_issuer_address(token_id)
            .map_err(|e| e.at_step("resolve-warehouse"))?;
        let creditor_wallet = self
            .authenticate(creditor)
            .map_err(|e| e.at_step("authenticate-creditor"))?;

        let outcome = self
            .gateway
            .transfer_token(&creditor_wallet, &warehouse, token_id, TOKEN_UNIT)
            .await
            .map_err(|e| e.at_step("warehouse-transfer"))?;

        tracing::info!(op_id = %op_id, hash = %outcome.hash, warehouse = %warehouse, "transfer_to_warehouse completed");
        Ok(outcome)
    }

    /// 违约处置：仓单回仓库，贷款注销
    pub async fn transfer_to_warehouse_with_loan(
        &self,
        token_id: &str,
        creditor: &PartyCredentials,
    ) -> Result<TransactionOutcome, CoreError> {
        let op_id = Uuid::new_v4();
        tracing::info!(op_id = %op_id, token_id = %token_id, "transfer_to_warehouse_with_loan started");

        let _guard = self.gateway.lock().await;

        let creditor_wallet = self
            .authenticate(creditor)
            .map_err(|e| e.at_step("authenticate-creditor"))?;

        let loan = self
            .registry
            .get_loan(token_id)
            .await
            .map_err(|e| e.at_step("load-loan"))?;

        if loan.creditor_wallet.address != creditor_wallet.address {
            return Err(CoreError::AddressMismatch {
                derived: creditor_wallet.address.clone(),
                asserted: loan.creditor_wallet.address.clone(),
            }
            .at_step("verify-loan-parties"));
        }

        let warehouse = self
            .gateway
            .resolve_issuer_address(token_id)
            .map_err(|e| e.at_step("resolve-warehouse"))?;
        let lending = self
            .lending_wallet()
            .map_err(|e| e.at_step("derive-platform-wallets"))?;

        self.gateway
            .transfer_token(
                &creditor_wallet,
                &lending.address,
                &loan.debt_token_id,
                TOKEN_UNIT,
            )
            .await
            .map_err(|e| e.at_step("debt-return"))?;
        self.gateway
            .destroy_token(&lending, &loan.debt_token_id)
            .await
            .map_err(|e| e.at_step("debt-destroy"))?;

        let outcome = self
            .gateway
            .transfer_token(&creditor_wallet, &warehouse, token_id, TOKEN_UNIT)
            .await
            .map_err(|e| e.at_step("warehouse-transfer"))?;

        self.registry
            .remove_loan(token_id)
            .await
            .map_err(|e| e.at_step("deregister-loan"))?;

        tracing::info!(op_id = %op_id, hash = %outcome.hash, "transfer_to_warehouse_with_loan completed");
        Ok(outcome)
    }
}
