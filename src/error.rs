//! 统一错误定义
//!
//! `CoreError` 是领域/服务层的类型化错误分类，调用方可以精确匹配；
//! `AppError` 是 HTTP 层的响应错误，`CoreError` 通过 `From` 映射过去。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// 领域错误分类
///
/// 网关、派生、登记簿和工作流都返回这里的具体类别，
/// 上层（API / 利息任务）根据类别决定映射或重试。
#[derive(Debug, Error)]
pub enum CoreError {
    /// 入参校验失败（空交易、非法hex、格式错误等）
    #[error("validation failed: {0}")]
    Validation(String),

    /// 钱包派生失败（种子或路径非法）
    #[error("wallet derivation failed: {0}")]
    Derivation(String),

    /// 密码格式非法（必须是 `<hexSeed>-<index>`）
    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// 派生地址与调用方声称的地址不一致
    #[error("address mismatch: derived {derived}, asserted {asserted}")]
    AddressMismatch { derived: String, asserted: String },

    /// 网络/RPC 通信失败
    #[error("ledger network error: {0}")]
    Network(String),

    /// 账本拒绝交易（engine result 非成功码）
    #[error("ledger rejected transaction: {code}")]
    Submission { code: String },

    /// 账本响应形状/编码异常
    #[error("unexpected ledger response: {0}")]
    Response(String),

    /// 无法从提交响应中解析序列号
    #[error("sequence extraction failed: {0}")]
    SequenceExtraction(String),

    /// 资源不存在（账户、贷款、交易）
    #[error("not found: {0}")]
    NotFound(String),

    /// 余额不足以覆盖手续费+准备金
    #[error("insufficient funds: balance {balance} drops, required clearance {required} drops")]
    InsufficientFunds { balance: u64, required: u64 },

    /// 等待账本最终确认超时
    #[error("timed out waiting for ledger finality: {0}")]
    Timeout(String),

    /// 代币元数据字段非法
    #[error("invalid token metadata: {0}")]
    InvalidMetadata(String),

    /// 元数据blob超出大小上限
    #[error("metadata blob too large: {size} bytes (limit {limit})")]
    BlobTooLarge { size: usize, limit: usize },

    /// 元数据blob解码失败
    #[error("metadata decode failed: {0}")]
    Decode(String),

    /// 多步操作中某一步失败，携带步骤名上下文
    #[error("step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// 给错误包上步骤名（工作流传播第一处失败时使用）
    pub fn at_step(self, step: &'static str) -> Self {
        CoreError::Step {
            step,
            source: Box::new(self),
        }
    }

    /// 剥掉步骤包装，取最里层的类别（映射HTTP状态时使用）
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

/// HTTP 层错误码
#[derive(Debug, Clone)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    Unauthorized,
    NotFound,
    Timeout,
    Network,
    Internal,

    // 业务错误码
    InsufficientBalance,
    InvalidAddress,
    InvalidPassword,
    AddressMismatch,
    TransactionRejected,
    LedgerResponseInvalid,
    InvalidMetadata,
    LoanNotFound,
}

/// HTTP 层错误响应
#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code_str = match self.code {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::Unauthorized => "unauthorized",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Timeout => "timeout",
            AppErrorCode::Network => "network",
            AppErrorCode::Internal => "internal",
            AppErrorCode::InsufficientBalance => "insufficient_balance",
            AppErrorCode::InvalidAddress => "invalid_address",
            AppErrorCode::InvalidPassword => "invalid_password",
            AppErrorCode::AddressMismatch => "address_mismatch",
            AppErrorCode::TransactionRejected => "transaction_rejected",
            AppErrorCode::LedgerResponseInvalid => "ledger_response_invalid",
            AppErrorCode::InvalidMetadata => "invalid_metadata",
            AppErrorCode::LoanNotFound => "loan_not_found",
        };
        let body = ErrorBody {
            code: code_str,
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::BadRequest,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
            trace_id: None,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::NotFound,
            message: msg.into(),
            status: StatusCode::NOT_FOUND,
            trace_id: None,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::Unauthorized,
            message: msg.into(),
            status: StatusCode::UNAUTHORIZED,
            trace_id: None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::Internal,
            message: msg.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            trace_id: None,
        }
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

/// 领域错误 → HTTP 错误映射
///
/// 映射看最里层类别；消息保留完整的步骤上下文链。
impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let (code, status) = match err.root() {
            CoreError::Validation(_) | CoreError::Decode(_) => {
                (AppErrorCode::BadRequest, StatusCode::BAD_REQUEST)
            }
            CoreError::Derivation(_) => (AppErrorCode::BadRequest, StatusCode::BAD_REQUEST),
            CoreError::InvalidPassword(_) => {
                (AppErrorCode::InvalidPassword, StatusCode::BAD_REQUEST)
            }
            CoreError::AddressMismatch { .. } => {
                (AppErrorCode::AddressMismatch, StatusCode::UNAUTHORIZED)
            }
            CoreError::Network(_) => (AppErrorCode::Network, StatusCode::BAD_GATEWAY),
            CoreError::Submission { .. } => {
                (AppErrorCode::TransactionRejected, StatusCode::BAD_REQUEST)
            }
            CoreError::Response(_) | CoreError::SequenceExtraction(_) => (
                AppErrorCode::LedgerResponseInvalid,
                StatusCode::BAD_GATEWAY,
            ),
            CoreError::NotFound(what) if what.starts_with("loan") => {
                (AppErrorCode::LoanNotFound, StatusCode::NOT_FOUND)
            }
            CoreError::NotFound(_) => (AppErrorCode::NotFound, StatusCode::NOT_FOUND),
            CoreError::InsufficientFunds { .. } => {
                (AppErrorCode::InsufficientBalance, StatusCode::BAD_REQUEST)
            }
            CoreError::Timeout(_) => (AppErrorCode::Timeout, StatusCode::GATEWAY_TIMEOUT),
            CoreError::InvalidMetadata(_) | CoreError::BlobTooLarge { .. } => {
                (AppErrorCode::InvalidMetadata, StatusCode::BAD_REQUEST)
            }
            CoreError::Step { .. } => (AppErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        };
        Self {
            code,
            message,
            status,
            trace_id: None,
        }
    }
}

// 从 serde_json 错误转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("JSON serialization error: {}", err))
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{}", err))
    }
}
