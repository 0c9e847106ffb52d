//! 测试辅助模块
//! 内存账本：模拟账户/序列号/代币持仓/信任线，让完整贷款生命周期不触网络跑通

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use warrantcore::config::Config;
use warrantcore::domain::address_codec;
use warrantcore::error::CoreError;
use warrantcore::infrastructure::ledger_rpc::{AccountInfo, FeeAndReserve, LedgerApi};

/// 测试用平台种子
pub const PLATFORM_SEED: &str =
    "ab8c4f7e2d315a9b8c4f7e2d315a9b8c4f7e2d315a9b8c4f7e2d315a9b8c4f7e";
/// 测试用用户种子
pub const USER_SEED: &str =
    "434670347c6bb7c791e3629fc79c38307315d625fc5b448a601abda6ba54f7ef\
     d0cfe70bf769f7e3545c970851f6fe9132ad658101ed1ff9cb2edfeb5dd2d19f";

/// 记录下来的发行币支付
#[derive(Debug, Clone)]
pub struct IssuedPayment {
    pub from: String,
    pub to: String,
    pub currency: String,
    pub issuer: String,
    pub value: Decimal,
}

#[derive(Default)]
struct LedgerState {
    /// 地址 → (余额drops, 序列号)
    accounts: HashMap<String, (u64, u32)>,
    /// (发行ID, 地址) → 持仓
    holdings: HashMap<(String, String), i64>,
    /// 已授权 (发行ID, 地址)
    authorized: HashSet<(String, String)>,
    /// 信任线 (持有人, 货币, 发行方)
    trustlines: HashSet<(String, String, String)>,
    /// 已销毁的发行
    destroyed: HashSet<String>,
    issued_payments: Vec<IssuedPayment>,
    tx_counter: u64,
    /// 置为 Some 时下一笔发行币支付按该码拒绝
    fail_issued_payments: Option<String>,
}

/// 内存账本
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LedgerState::default()),
        })
    }

    /// 预置一个已注资账户
    pub fn fund_account(&self, address: &str, drops: u64) {
        let mut state = self.state.lock().unwrap();
        state.accounts.insert(address.to_string(), (drops, 1));
    }

    pub fn balance_of(&self, address: &str) -> Option<u64> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(address)
            .map(|(b, _)| *b)
    }

    /// 预置代币持仓（测试里给借款人发仓单）
    pub fn set_holding(&self, issuance_id: &str, address: &str, amount: i64) {
        let mut state = self.state.lock().unwrap();
        state
            .holdings
            .insert((issuance_id.to_string(), address.to_string()), amount);
    }

    pub fn holding_of(&self, issuance_id: &str, address: &str) -> i64 {
        *self
            .state
            .lock()
            .unwrap()
            .holdings
            .get(&(issuance_id.to_string(), address.to_string()))
            .unwrap_or(&0)
    }

    /// 预置信任线（独立计息测试用）
    pub fn add_trustline(&self, holder: &str, currency: &str, issuer: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .trustlines
            .insert((holder.into(), currency.into(), issuer.into()));
    }

    pub fn issued_payments(&self) -> Vec<IssuedPayment> {
        self.state.lock().unwrap().issued_payments.clone()
    }

    pub fn is_destroyed(&self, issuance_id: &str) -> bool {
        self.state.lock().unwrap().destroyed.contains(issuance_id)
    }

    /// 让后续发行币支付失败（计息重试路径）
    pub fn fail_issued_payments(&self, code: Option<&str>) {
        self.state.lock().unwrap().fail_issued_payments = code.map(|c| c.to_string());
    }

    /// 发行ID → 发行方地址
    fn issuer_of(issuance_id: &str) -> String {
        let bytes = hex::decode(&issuance_id[8..]).expect("issuance id tail must be hex");
        let mut account_id = [0u8; 20];
        account_id.copy_from_slice(&bytes);
        address_codec::encode_account_id(&account_id)
    }

    /// 应用一笔交易，返回 engine_result
    fn apply(state: &mut LedgerState, tx: &Value, sequence: u32) -> String {
        let tx_type = tx["TransactionType"].as_str().unwrap_or("");
        let account = tx["Account"].as_str().unwrap_or("").to_string();

        match tx_type {
            "Payment" => match &tx["Amount"] {
                // 原生币支付：字符串drops
                Value::String(drops) => {
                    let amount: u64 = drops.parse().expect("drops must be numeric");
                    let destination = tx["Destination"].as_str().unwrap_or("").to_string();

                    let (balance, _) = state.accounts.get_mut(&account).expect("sender funded");
                    if *balance < amount {
                        return "tecUNFUNDED_PAYMENT".into();
                    }
                    *balance -= amount;
                    state
                        .accounts
                        .entry(destination)
                        .and_modify(|(b, _)| *b += amount)
                        .or_insert((amount, 1));
                    "tesSUCCESS".into()
                }
                // 发行币或代币支付：对象
                Value::Object(amount_obj) => {
                    if let Some(issuance_id) =
                        amount_obj.get("mpt_issuance_id").and_then(|v| v.as_str())
                    {
                        let destination = tx["Destination"].as_str().unwrap_or("").to_string();
                        let value: i64 = amount_obj["value"]
                            .as_str()
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);

                        if state.destroyed.contains(issuance_id) {
                            return "tecOBJECT_NOT_FOUND".into();
                        }
                        // 非发行方接收需要事先授权
                        let issuer = Self::issuer_of(issuance_id);
                        if destination != issuer
                            && !state
                                .authorized
                                .contains(&(issuance_id.to_string(), destination.clone()))
                        {
                            return "tecNO_AUTH".into();
                        }

                        *state
                            .holdings
                            .entry((issuance_id.to_string(), account))
                            .or_insert(0) -= value;
                        *state
                            .holdings
                            .entry((issuance_id.to_string(), destination))
                            .or_insert(0) += value;
                        "tesSUCCESS".into()
                    } else {
                        let destination = tx["Destination"].as_str().unwrap_or("").to_string();
                        let currency = amount_obj["currency"].as_str().unwrap_or("").to_string();
                        let issuer = amount_obj["issuer"].as_str().unwrap_or("").to_string();
                        let value = amount_obj["value"]
                            .as_str()
                            .and_then(|v| v.parse::<Decimal>().ok())
                            .unwrap_or(Decimal::ZERO);

                        if let Some(code) = &state.fail_issued_payments {
                            return code.clone();
                        }
                        // 非发行方接收需要信任线
                        if destination != issuer
                            && !state.trustlines.contains(&(
                                destination.clone(),
                                currency.clone(),
                                issuer.clone(),
                            ))
                        {
                            return "tecNO_LINE".into();
                        }

                        state.issued_payments.push(IssuedPayment {
                            from: account,
                            to: destination,
                            currency,
                            issuer,
                            value,
                        });
                        "tesSUCCESS".into()
                    }
                }
                _ => "temBAD_AMOUNT".into(),
            },
            "TrustSet" => {
                let limit = &tx["LimitAmount"];
                let currency = limit["currency"].as_str().unwrap_or("").to_string();
                let issuer = limit["issuer"].as_str().unwrap_or("").to_string();
                state.trustlines.insert((account, currency, issuer));
                "tesSUCCESS".into()
            }
            "MPTokenIssuanceCreate" => {
                if tx["MPTokenMetadata"].as_str().map(|b| b.is_empty()).unwrap_or(true) {
                    return "temMALFORMED".into();
                }
                // 发行ID由网关从序列号+账户ID推出；账本侧只消费序列号
                let _ = sequence;
                "tesSUCCESS".into()
            }
            "MPTokenAuthorize" => {
                let issuance_id = tx["MPTokenIssuanceID"].as_str().unwrap_or("").to_string();
                state.authorized.insert((issuance_id, account));
                "tesSUCCESS".into()
            }
            "MPTokenIssuanceDestroy" => {
                let issuance_id = tx["MPTokenIssuanceID"].as_str().unwrap_or("").to_string();
                let issuer = Self::issuer_of(&issuance_id);
                // 外部还有正持仓就拒绝销毁
                let outstanding = state
                    .holdings
                    .iter()
                    .any(|((id, holder), amount)| {
                        *id == issuance_id && *holder != issuer && *amount > 0
                    });
                if outstanding {
                    return "tecHAS_OBLIGATIONS".into();
                }
                state.destroyed.insert(issuance_id);
                "tesSUCCESS".into()
            }
            _ => "temUNKNOWN".into(),
        }
    }
}

#[async_trait]
impl LedgerApi for MockLedger {
    async fn get_fee_and_reserve(&self) -> Result<FeeAndReserve, CoreError> {
        Ok(FeeAndReserve {
            base_fee: 10,
            reserve_base: 1_000_000,
            reserve_increment: 200_000,
        })
    }

    async fn get_account_info(&self, address: &str) -> Result<AccountInfo, CoreError> {
        let state = self.state.lock().unwrap();
        state
            .accounts
            .get(address)
            .map(|(balance, sequence)| AccountInfo {
                balance: *balance,
                sequence: *sequence,
            })
            .ok_or_else(|| CoreError::NotFound(format!("account {}", address)))
    }

    async fn submit(&self, _secret: &str, tx_json: Value) -> Result<Value, CoreError> {
        let mut state = self.state.lock().unwrap();

        let account = tx_json["Account"].as_str().unwrap_or("").to_string();
        let sequence = match state.accounts.get_mut(&account) {
            Some((_, seq)) => {
                let assigned = *seq;
                *seq += 1;
                assigned
            }
            None => return Ok(json!({ "engine_result": "terNO_ACCOUNT", "tx_json": tx_json })),
        };

        let engine_result = Self::apply(&mut state, &tx_json, sequence);

        state.tx_counter += 1;
        let hash = hex::encode_upper(Sha256::digest(state.tx_counter.to_be_bytes()));

        let mut echoed = tx_json;
        echoed["hash"] = json!(hash);
        echoed["Sequence"] = json!(sequence);

        Ok(json!({
            "engine_result": engine_result,
            "tx_json": echoed,
        }))
    }

    async fn lookup_tx(&self, _hash: &str) -> Result<Value, CoreError> {
        Ok(json!({
            "validated": true,
            "meta": { "TransactionResult": "tesSUCCESS" },
        }))
    }
}

/// 测试配置：快轮询、短超时、默认贷款条款
pub fn test_config() -> Arc<Config> {
    let mut config = Config::from_env().expect("env config");
    config.ledger.platform_seed = PLATFORM_SEED.to_string();
    config.ledger.finality_timeout_secs = 2;
    config.ledger.poll_interval_ms = 1;
    config.loan.accrual_tick_secs = 1;
    Arc::new(config)
}
