// 账本JSON-RPC客户端 - 生产级实现
// 驱动 rippled 风格端点：server_state / account_info / submit(签名提交) / tx
// 共识、二进制编码和签名都在账本侧完成，这里只做请求封装和响应解码

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::CoreError;

const HTTP_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 账户不存在的账本错误码
const ERR_ACCOUNT_NOT_FOUND: &str = "actNotFound";
/// 交易尚不可见的账本错误码
const ERR_TX_NOT_FOUND: &str = "txnNotFound";

/// 手续费与准备金（单位：drops）
#[derive(Debug, Clone, Copy)]
pub struct FeeAndReserve {
    pub base_fee: u64,
    pub reserve_base: u64,
    pub reserve_increment: u64,
}

/// 账户信息
#[derive(Debug, Clone, Copy)]
pub struct AccountInfo {
    /// 余额（drops）
    pub balance: u64,
    /// 当前序列号
    pub sequence: u32,
}

/// 账本客户端接口
///
/// 网关只依赖这个trait；测试注入内存实现。
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// 查询基础费与准备金
    async fn get_fee_and_reserve(&self) -> Result<FeeAndReserve, CoreError>;

    /// 查询账户余额与序列号
    async fn get_account_info(&self, address: &str) -> Result<AccountInfo, CoreError>;

    /// 签名并提交交易（账本侧autofill序列号/费用）
    ///
    /// 返回JSON-RPC result对象原样；engine result 的判读在网关做。
    async fn submit(&self, secret: &str, tx_json: Value) -> Result<Value, CoreError>;

    /// 按哈希查询交易（用于轮询最终确认）
    async fn lookup_tx(&self, hash: &str) -> Result<Value, CoreError>;
}

/// 统一的动态数值解码
///
/// 账本响应里的数值字段可能是整数、浮点或数字字符串，
/// 全部在客户端边界收敛成 u64。
pub fn decode_numeric(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u)
            } else {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<u64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

/// JSON-RPC 账本客户端
pub struct LedgerRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
}

impl LedgerRpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client: client,
            rpc_url: rpc_url.into(),
        }
    }

    /// 内部方法：发送一次JSON-RPC请求并返回result对象
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, CoreError> {
        let payload = json!({
            "method": method,
            "params": [params],
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("failed to read {} response: {}", method, e)))?;

        if !status.is_success() {
            return Err(CoreError::Network(format!(
                "{} returned HTTP {}: {}",
                method, status, body
            )));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| CoreError::Response(format!("{} response is not JSON: {}", method, e)))?;

        let result = parsed
            .get("result")
            .cloned()
            .ok_or_else(|| CoreError::Response(format!("{} response missing result", method)))?;

        // 账本级错误：账户/交易不存在单独归类，其余按网络错误处理
        if let Some(code) = result.get("error").and_then(|e| e.as_str()) {
            if code == ERR_ACCOUNT_NOT_FOUND || code == ERR_TX_NOT_FOUND {
                return Err(CoreError::NotFound(format!("{}: {}", method, code)));
            }
            let message = result
                .get("error_message")
                .and_then(|m| m.as_str())
                .unwrap_or(code);
            return Err(CoreError::Network(format!(
                "{} ledger error {}: {}",
                method, code, message
            )));
        }

        Ok(result)
    }
}

#[async_trait]
impl LedgerApi for LedgerRpcClient {
    async fn get_fee_and_reserve(&self) -> Result<FeeAndReserve, CoreError> {
        let result = self.rpc_call("server_state", json!({})).await?;

        let validated = result
            .get("state")
            .and_then(|s| s.get("validated_ledger"))
            .ok_or_else(|| {
                CoreError::Response("server_state missing state.validated_ledger".into())
            })?;

        let field = |name: &str| -> Result<u64, CoreError> {
            validated
                .get(name)
                .and_then(decode_numeric)
                .ok_or_else(|| {
                    CoreError::Response(format!("server_state field '{}' not numeric", name))
                })
        };

        Ok(FeeAndReserve {
            base_fee: field("base_fee")?,
            reserve_base: field("reserve_base")?,
            reserve_increment: field("reserve_inc")?,
        })
    }

    async fn get_account_info(&self, address: &str) -> Result<AccountInfo, CoreError> {
        let result = self
            .rpc_call(
                "account_info",
                json!({ "account": address, "ledger_index": "validated" }),
            )
            .await?;

        let account_data = result
            .get("account_data")
            .ok_or_else(|| CoreError::Response("account_info missing account_data".into()))?;

        let balance = account_data
            .get("Balance")
            .and_then(decode_numeric)
            .ok_or_else(|| CoreError::Response("account_info Balance not numeric".into()))?;

        let sequence = account_data
            .get("Sequence")
            .and_then(decode_numeric)
            .ok_or_else(|| CoreError::Response("account_info Sequence not numeric".into()))?;

        Ok(AccountInfo {
            balance,
            sequence: sequence as u32,
        })
    }

    async fn submit(&self, secret: &str, tx_json: Value) -> Result<Value, CoreError> {
        tracing::debug!(
            tx_type = tx_json.get("TransactionType").and_then(|t| t.as_str()).unwrap_or("?"),
            account = tx_json.get("Account").and_then(|a| a.as_str()).unwrap_or("?"),
            "Submitting transaction"
        );

        self.rpc_call(
            "submit",
            json!({
                "secret": secret,
                "tx_json": tx_json,
                "fail_hard": false,
            }),
        )
        .await
    }

    async fn lookup_tx(&self, hash: &str) -> Result<Value, CoreError> {
        self.rpc_call("tx", json!({ "transaction": hash, "binary": false }))
            .await
    }
}
