//! 计息任务测试
//!
//! 验证补计周期数、失败重试语义和停机句柄。

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use common::{test_config, MockLedger, PLATFORM_SEED, USER_SEED};
use rust_decimal::Decimal;
use tokio::sync::watch;
use warrantcore::app_state::AppState;
use warrantcore::domain::derivation::WalletDeriver;
use warrantcore::domain::loan::Loan;
use warrantcore::service::interest_accrual::InterestAccrual;
use warrantcore::utils::password::derivation_path_for_index;

const PERIOD_SECS: i64 = 1000;
const TOKEN_ID: &str = "00000001AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

struct Harness {
    ledger: Arc<MockLedger>,
    state: AppState,
    accrual: Arc<InterestAccrual>,
    lending_address: String,
}

/// 手工登记一笔贷款，next_payment 落后 `periods_behind × period`
async fn setup(periods_behind: f64) -> Harness {
    let ledger = MockLedger::new();
    let mut config = (*test_config()).clone();
    config.loan.accrual_period_secs = PERIOD_SECS as u64;
    let config = Arc::new(config);
    let state = AppState::new(config.clone(), ledger.clone());

    let deriver = WalletDeriver::new();
    let owner = deriver
        .derive(USER_SEED, &derivation_path_for_index(0))
        .unwrap();
    let creditor = deriver
        .derive(USER_SEED, &derivation_path_for_index(1))
        .unwrap();
    let lending = deriver
        .derive(PLATFORM_SEED, &derivation_path_for_index(1))
        .unwrap();

    ledger.fund_account(&owner.address, 100_000_000);
    ledger.fund_account(&creditor.address, 100_000_000);
    ledger.fund_account(&lending.address, 100_000_000);
    // 出借人收息需要信任线
    ledger.add_trustline(&creditor.address, "USD", &lending.address);

    let behind = Duration::milliseconds((periods_behind * PERIOD_SECS as f64 * 1000.0) as i64);
    let loan = Loan {
        principal: Decimal::from(100),
        annual_rate_percent: Decimal::from(10),
        accrual_period: Duration::seconds(PERIOD_SECS),
        next_payment: Utc::now() - behind,
        owner_wallet: owner,
        creditor_wallet: creditor,
        currency: "USD".into(),
        debt_token_id: "2".repeat(48),
    };
    state.registry.add_loan(TOKEN_ID, loan).await.unwrap();

    let accrual = Arc::new(InterestAccrual::new(
        state.gateway.clone(),
        state.registry.clone(),
        lending.address.clone(),
        config.loan.clone(),
    ));

    Harness {
        ledger,
        state,
        accrual,
        lending_address: lending.address.clone(),
    }
}

#[tokio::test]
async fn test_catches_up_exactly_elapsed_periods() {
    // 落后1.5个周期 → 两期到期（-1.5p 和 -0.5p）
    let h = setup(1.5).await;
    let before = h.state.registry.get_loan(TOKEN_ID).await.unwrap();

    let paid = h.accrual.accrue_due_loans().await;
    assert_eq!(paid, 2);

    let after = h.state.registry.get_loan(TOKEN_ID).await.unwrap();
    assert_eq!(
        after.next_payment,
        before.next_payment + Duration::seconds(2 * PERIOD_SECS)
    );

    // 两笔利息：借款人 → 出借人，金额 = 100 × 10 / 36500
    let payments = h.ledger.issued_payments();
    assert_eq!(payments.len(), 2);
    let expected = Decimal::from(100) * Decimal::from(10) / Decimal::from(36_500);
    for payment in &payments {
        assert_eq!(payment.from, before.owner_wallet.address);
        assert_eq!(payment.to, before.creditor_wallet.address);
        assert_eq!(payment.issuer, h.lending_address);
        assert_eq!(payment.value, expected);
    }

    // 再跑一轮：没有新到期周期
    assert_eq!(h.accrual.accrue_due_loans().await, 0);
}

#[tokio::test]
async fn test_not_due_loan_untouched() {
    // next_payment 在未来
    let h = setup(-1.0).await;

    assert_eq!(h.accrual.accrue_due_loans().await, 0);
    assert!(h.ledger.issued_payments().is_empty());
}

#[tokio::test]
async fn test_failed_payment_retried_next_tick() {
    let h = setup(0.5).await;
    let before = h.state.registry.get_loan(TOKEN_ID).await.unwrap();

    // 支付失败：不推进、不移除，等下个节拍
    h.ledger.fail_issued_payments(Some("tecPATH_DRY"));
    assert_eq!(h.accrual.accrue_due_loans().await, 0);

    let unchanged = h.state.registry.get_loan(TOKEN_ID).await.unwrap();
    assert_eq!(unchanged.next_payment, before.next_payment);

    // 故障恢复后补上这一期
    h.ledger.fail_issued_payments(None);
    assert_eq!(h.accrual.accrue_due_loans().await, 1);
    let after = h.state.registry.get_loan(TOKEN_ID).await.unwrap();
    assert_eq!(
        after.next_payment,
        before.next_payment + Duration::seconds(PERIOD_SECS)
    );
}

#[tokio::test]
async fn test_shutdown_handle_stops_task() {
    let h = setup(-1.0).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(h.accrual.clone().run(shutdown_rx));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(StdDuration::from_secs(5), handle)
        .await
        .expect("accrual task must stop after shutdown signal")
        .unwrap();
}
