//! 贷款领域模型
//!
//! 贷款条款在版本内固定（见 `LoanConfig` 默认值），
//! 登记后只有计息任务推进 `next_payment`，买断/违约时整体移除。

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::domain::derivation::Wallet;

/// 年化利率换算分母：百分比 ×100，每年 ×365
static RATE_DIVISOR: Lazy<Decimal> = Lazy::new(|| Decimal::from(36_500));

/// 一笔在册贷款
///
/// 以抵押代币ID为键登记；钱包副本只存在于内存，随进程消亡。
#[derive(Debug, Clone)]
pub struct Loan {
    /// 本金（稳定币单位）
    pub principal: Decimal,
    /// 年利率（百分比）
    pub annual_rate_percent: Decimal,
    /// 计息周期
    pub accrual_period: Duration,
    /// 下一次计息时间
    pub next_payment: DateTime<Utc>,
    /// 借款人（仓单原持有人）钱包
    pub owner_wallet: Wallet,
    /// 出借人钱包
    pub creditor_wallet: Wallet,
    /// 计息使用的稳定币代码
    pub currency: String,
    /// 债务代币发行ID
    pub debt_token_id: String,
}

impl Loan {
    /// 单期利息：principal × (annual_rate / 100 / 365)
    pub fn daily_interest(&self) -> Decimal {
        self.principal * self.annual_rate_percent / *RATE_DIVISOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_wallet(address: &str) -> Wallet {
        Wallet {
            address: address.into(),
            public_key: String::new(),
            private_key: String::new(),
            secret: String::new(),
        }
    }

    fn sample_loan(principal: u32, rate: u32) -> Loan {
        Loan {
            principal: Decimal::from(principal),
            annual_rate_percent: Decimal::from(rate),
            accrual_period: Duration::days(1),
            next_payment: Utc::now(),
            owner_wallet: dummy_wallet("rOwner"),
            creditor_wallet: dummy_wallet("rCreditor"),
            currency: "USD".into(),
            debt_token_id: "0".repeat(48),
        }
    }

    #[test]
    fn test_daily_interest_formula() {
        // 100 × 10% / 365
        let loan = sample_loan(100, 10);
        let expected = Decimal::from(1000) / Decimal::from(36_500);
        assert_eq!(loan.daily_interest(), expected);
    }

    #[test]
    fn test_daily_interest_zero_rate() {
        let loan = sample_loan(100, 0);
        assert_eq!(loan.daily_interest(), Decimal::ZERO);
    }
}
