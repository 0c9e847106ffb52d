//! 利息计提任务
//!
//! 固定节拍扫描登记簿：对每笔过了 next_payment 的贷款，
//! 借款人→出借人提交一笔发行币利息支付，成功后把 next_payment 推进一个周期；
//! 落后 N 个周期就连续补 N 期。支付失败只记日志，下个节拍重试，贷款保持在册。
//! 通过 watch 通道优雅停机，而不是放养的无限循环。

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::config::LoanConfig;
use crate::error::CoreError;
use crate::service::loan_registry::LoanRegistry;
use crate::service::tx_gateway::TransactionGateway;

/// 单笔贷款单个节拍内最多补计的周期数，防止时钟异常导致支付风暴
const MAX_CATCH_UP_PERIODS: u32 = 48;

pub struct InterestAccrual {
    gateway: Arc<TransactionGateway>,
    registry: Arc<LoanRegistry>,
    /// 稳定币发行方（平台放贷账户）地址
    issuer_address: String,
    config: LoanConfig,
}

impl InterestAccrual {
    pub fn new(
        gateway: Arc<TransactionGateway>,
        registry: Arc<LoanRegistry>,
        issuer_address: String,
        config: LoanConfig,
    ) -> Self {
        Self {
            gateway,
            registry,
            issuer_address,
            config,
        }
    }

    /// 启动后台计息任务（持续运行直到收到停机信号）
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.config.accrual_tick_secs));

        tracing::info!(
            tick_secs = self.config.accrual_tick_secs,
            period_secs = self.config.accrual_period_secs,
            "Interest accrual task started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let paid = self.accrue_due_loans().await;
                    if paid > 0 {
                        tracing::info!(count = paid, "Accrued interest payments");
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Interest accrual task stopping");
                    break;
                }
            }
        }
    }

    /// 处理一轮到期贷款，返回成功支付的期数
    ///
    /// 测试直接调用这个方法，不经过节拍器。
    pub async fn accrue_due_loans(&self) -> usize {
        let now = Utc::now();
        let due = self.registry.due_loans(now).await;
        let mut paid = 0usize;

        for (token_id, loan) in due {
            let mut next_payment = loan.next_payment;
            let mut periods = 0u32;

            // 逐期补计：支付成功才推进，失败留待下个节拍重试
            while next_payment <= now && periods < MAX_CATCH_UP_PERIODS {
                match self.pay_one_period(&token_id, &loan).await {
                    Ok(()) => {
                        if !self
                            .registry
                            .advance_next_payment(&token_id, loan.accrual_period)
                            .await
                        {
                            // 贷款已被并发买断/赎回
                            break;
                        }
                        next_payment += loan.accrual_period;
                        periods += 1;
                        paid += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            token_id = %token_id,
                            error = %e,
                            "Interest payment failed, will retry next tick"
                        );
                        break;
                    }
                }
            }
        }

        paid
    }

    /// 支付一期利息：借款人 → 出借人
    async fn pay_one_period(&self, token_id: &str, loan: &crate::domain::loan::Loan) -> Result<(), CoreError> {
        let interest = loan.daily_interest();

        // 与请求路径共用同一把提交锁，避免序列号竞争
        let _guard = self.gateway.lock().await;

        tracing::debug!(
            token_id = %token_id,
            borrower = %loan.owner_wallet.address,
            lender = %loan.creditor_wallet.address,
            amount = %interest,
            currency = %loan.currency,
            "Paying interest period"
        );

        self.gateway
            .payment_issued(
                &loan.owner_wallet,
                &loan.creditor_wallet.address,
                &loan.currency,
                &self.issuer_address,
                interest,
            )
            .await?;

        Ok(())
    }
}
