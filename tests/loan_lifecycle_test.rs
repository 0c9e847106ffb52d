//! 贷款生命周期端到端测试
//!
//! 用内存账本跑完整的 托管→放款→计息登记→买断/违约 流程。

mod common;

use std::sync::Arc;

use common::{test_config, MockLedger, PLATFORM_SEED, USER_SEED};
use rust_decimal::Decimal;
use warrantcore::app_state::AppState;
use warrantcore::domain::derivation::WalletDeriver;
use warrantcore::domain::token_metadata::TokenMetadata;
use warrantcore::error::CoreError;
use warrantcore::service::loan_workflow::PartyCredentials;
use warrantcore::utils::password::derivation_path_for_index;

struct Harness {
    ledger: Arc<MockLedger>,
    state: AppState,
    owner: PartyCredentials,
    creditor: PartyCredentials,
    warehouse_address: String,
    warrant_id: String,
}

async fn setup() -> Harness {
    let ledger = MockLedger::new();
    let config = test_config();
    let state = AppState::new(config, ledger.clone());

    let deriver = WalletDeriver::new();
    let owner_wallet = deriver
        .derive(USER_SEED, &derivation_path_for_index(0))
        .unwrap();
    let creditor_wallet = deriver
        .derive(USER_SEED, &derivation_path_for_index(1))
        .unwrap();
    let funding_wallet = deriver
        .derive(PLATFORM_SEED, &derivation_path_for_index(0))
        .unwrap();
    let warehouse_wallet = deriver
        .derive(PLATFORM_SEED, &derivation_path_for_index(9))
        .unwrap();

    // 各方预注资；放贷账户故意缺席，走首次注资创建路径
    ledger.fund_account(&owner_wallet.address, 100_000_000);
    ledger.fund_account(&creditor_wallet.address, 100_000_000);
    ledger.fund_account(&funding_wallet.address, 1_000_000_000);
    ledger.fund_account(&warehouse_wallet.address, 100_000_000);

    // 仓库铸造仓单；借款人此前已持有（历史流转直接预置）
    let metadata = TokenMetadata::warrant("Grain warrant #1", "Acme Warehousing", "doc-sha256");
    let mint = state
        .gateway
        .mint_token(&warehouse_wallet, &metadata, 1, 0)
        .await
        .unwrap();
    ledger.set_holding(&mint.issuance_id, &owner_wallet.address, 1);

    Harness {
        ledger,
        state,
        owner: PartyCredentials {
            address: owner_wallet.address.clone(),
            password: format!("{}-0", USER_SEED),
        },
        creditor: PartyCredentials {
            address: creditor_wallet.address.clone(),
            password: format!("{}-1", USER_SEED),
        },
        warehouse_address: warehouse_wallet.address.clone(),
        warrant_id: mint.issuance_id,
    }
}

#[tokio::test]
async fn test_issue_then_buyout_leaves_no_loan() {
    let h = setup().await;

    // 放款
    h.state
        .workflow
        .issue_to_creditor_with_loan(&h.warrant_id, &h.owner, &h.creditor)
        .await
        .unwrap();

    let loan = h.state.registry.get_loan(&h.warrant_id).await.unwrap();
    assert_eq!(loan.principal, Decimal::from(100));
    assert_eq!(loan.owner_wallet.address, h.owner.address);
    assert_eq!(loan.creditor_wallet.address, h.creditor.address);
    let debt_id = loan.debt_token_id.clone();
    assert_eq!(debt_id.len(), 48);

    // 仓单和债务代币都在出借人手里
    assert_eq!(h.ledger.holding_of(&h.warrant_id, &h.owner.address), 0);
    assert_eq!(h.ledger.holding_of(&h.warrant_id, &h.creditor.address), 1);
    assert_eq!(h.ledger.holding_of(&debt_id, &h.creditor.address), 1);

    // 铺底 + 放款的发行币流水
    let payments = h.ledger.issued_payments();
    assert_eq!(payments.len(), 3);
    assert_eq!(payments[0].to, h.owner.address);
    assert_eq!(payments[0].value, Decimal::from(10)); // principal / 10
    assert_eq!(payments[1].to, h.creditor.address);
    assert_eq!(payments[1].value, Decimal::from(100));
    assert_eq!(payments[2].from, h.creditor.address);
    assert_eq!(payments[2].to, h.owner.address);
    assert_eq!(payments[2].value, Decimal::from(100));

    // 买断
    h.state
        .workflow
        .buyout_from_creditor_with_loan(&h.warrant_id, &h.owner, &h.creditor)
        .await
        .unwrap();

    // 登记簿清空，仓单回借款人，债务代币销毁
    assert!(h.state.registry.get_loan(&h.warrant_id).await.is_err());
    assert!(h.state.registry.is_empty().await);
    assert_eq!(h.ledger.holding_of(&h.warrant_id, &h.owner.address), 1);
    assert_eq!(h.ledger.holding_of(&debt_id, &h.creditor.address), 0);
    assert!(h.ledger.is_destroyed(&debt_id));

    // 还本流水：借款人 → 出借人，足额本金
    let payments = h.ledger.issued_payments();
    let repayment = payments.last().unwrap();
    assert_eq!(repayment.from, h.owner.address);
    assert_eq!(repayment.to, h.creditor.address);
    assert_eq!(repayment.value, Decimal::from(100));
}

#[tokio::test]
async fn test_buyout_without_issuance_fails_not_found() {
    let h = setup().await;

    let err = h
        .state
        .workflow
        .buyout_from_creditor_with_loan(&h.warrant_id, &h.owner, &h.creditor)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_duplicate_issuance_rejected() {
    let h = setup().await;

    h.state
        .workflow
        .issue_to_creditor_with_loan(&h.warrant_id, &h.owner, &h.creditor)
        .await
        .unwrap();

    let err = h
        .state
        .workflow
        .issue_to_creditor_with_loan(&h.warrant_id, &h.owner, &h.creditor)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), CoreError::Validation(_)));

    // 第一笔贷款不受影响
    assert_eq!(h.state.registry.len().await, 1);
}

#[tokio::test]
async fn test_default_transfers_warrant_to_warehouse() {
    let h = setup().await;

    h.state
        .workflow
        .issue_to_creditor_with_loan(&h.warrant_id, &h.owner, &h.creditor)
        .await
        .unwrap();
    let debt_id = h
        .state
        .registry
        .get_loan(&h.warrant_id)
        .await
        .unwrap()
        .debt_token_id
        .clone();

    // 违约处置：出借人把仓单交回仓库
    h.state
        .workflow
        .transfer_to_warehouse_with_loan(&h.warrant_id, &h.creditor)
        .await
        .unwrap();

    assert!(h.state.registry.is_empty().await);
    assert_eq!(h.ledger.holding_of(&h.warrant_id, &h.warehouse_address), 1);
    assert_eq!(h.ledger.holding_of(&h.warrant_id, &h.creditor.address), 0);
    assert!(h.ledger.is_destroyed(&debt_id));
}

#[tokio::test]
async fn test_issue_without_loan_moves_warrant_only() {
    let h = setup().await;

    h.state
        .workflow
        .issue_to_creditor(&h.warrant_id, &h.owner, &h.creditor)
        .await
        .unwrap();

    assert_eq!(h.ledger.holding_of(&h.warrant_id, &h.creditor.address), 1);
    assert!(h.state.registry.is_empty().await);
    // 无任何发行币流水
    assert!(h.ledger.issued_payments().is_empty());

    // 无贷款买回
    h.state
        .workflow
        .buyout_from_creditor(&h.warrant_id, &h.owner, &h.creditor)
        .await
        .unwrap();
    assert_eq!(h.ledger.holding_of(&h.warrant_id, &h.owner.address), 1);
}

#[tokio::test]
async fn test_wrong_password_is_address_mismatch() {
    let h = setup().await;

    // 借款人口令派生的地址与声称地址不符
    let impostor = PartyCredentials {
        address: h.owner.address.clone(),
        password: format!("{}-5", USER_SEED),
    };

    let err = h
        .state
        .workflow
        .issue_to_creditor_with_loan(&h.warrant_id, &impostor, &h.creditor)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), CoreError::AddressMismatch { .. }));
    assert!(h.state.registry.is_empty().await);
}

#[tokio::test]
async fn test_malformed_password_rejected() {
    let h = setup().await;

    let bad = PartyCredentials {
        address: h.owner.address.clone(),
        password: "missing_dash".into(),
    };

    let err = h
        .state
        .workflow
        .issue_to_creditor(&h.warrant_id, &bad, &h.creditor)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), CoreError::InvalidPassword(_)));
}

#[tokio::test]
async fn test_warehouse_resolution_round_trip() {
    let h = setup().await;

    // 仓单发行ID反解必须回到铸造方（仓库）地址
    let resolved = h
        .state
        .gateway
        .resolve_issuer_address(&h.warrant_id)
        .unwrap();
    assert_eq!(resolved, h.warehouse_address);
    assert_eq!(h.warrant_id.len(), 48);
    assert!(h.warrant_id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_account_service_deposit_and_balance() {
    let h = setup().await;

    let address = h
        .state
        .accounts
        .create(&format!("{}-3", USER_SEED))
        .unwrap();

    // 新账户在账本上还不存在
    let err = h.state.accounts.get_balance(&address).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    // 入金创建账户
    h.state.accounts.deposit(&address, 5_000_000).await.unwrap();
    assert_eq!(h.state.accounts.get_balance(&address).await.unwrap(), 5_000_000);

    // 清空余额：5_000_000 − (10×1.2 + 1_000_000 + 200_000) = 3_799_988 回流平台
    let funding_before = h
        .ledger
        .balance_of(&h.state.accounts.create(&format!("{}-0", PLATFORM_SEED)).unwrap());
    h.state
        .accounts
        .clear_balance(&address, &format!("{}-3", USER_SEED))
        .await
        .unwrap();
    assert_eq!(
        h.state.accounts.get_balance(&address).await.unwrap(),
        1_200_012
    );
    let funding_after = h
        .ledger
        .balance_of(&h.state.accounts.create(&format!("{}-0", PLATFORM_SEED)).unwrap());
    assert_eq!(
        funding_after.unwrap(),
        funding_before.unwrap() + 3_799_988
    );
}
