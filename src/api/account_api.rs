//! 账户 API
//! 创建（纯派生）、入金、清空余额、查余额

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    error::AppError,
};

/// 创建账户请求
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateAccountRequest {
    /// `<hexSeed>-<index>` 口令
    pub password: String,
}

/// 创建账户响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateAccountResponse {
    pub address: String,
}

/// 入金请求
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct DepositRequest {
    pub address: String,
    /// 金额（drops）
    pub amount_drops: u64,
}

/// 清空余额请求
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ClearBalanceRequest {
    pub address: String,
    pub password: String,
}

/// 交易结果视图
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TransactionView {
    pub hash: String,
    pub sequence: u32,
}

impl From<crate::service::tx_gateway::TransactionOutcome> for TransactionView {
    fn from(outcome: crate::service::tx_gateway::TransactionOutcome) -> Self {
        Self {
            hash: outcome.hash,
            sequence: outcome.sequence,
        }
    }
}

/// 余额响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    pub balance_drops: u64,
}

/// POST /api/account
///
/// 从口令派生账户地址（不触账本）
#[utoipa::path(
    post,
    path = "/api/account",
    request_body = CreateAccountRequest,
    responses((status = 200, description = "Derived account address"))
)]
pub async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<ApiResponse<CreateAccountResponse>>, AppError> {
    let address = state.accounts.create(&req.password)?;
    success_response(CreateAccountResponse { address })
}

/// POST /api/account/deposit
///
/// 平台资金账户向目标地址转 XRP，等待最终确认
#[utoipa::path(
    post,
    path = "/api/account/deposit",
    request_body = DepositRequest,
    responses((status = 200, description = "Deposit transaction applied"))
)]
pub async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, AppError> {
    let outcome = state.accounts.deposit(&req.address, req.amount_drops).await?;
    success_response(outcome.into())
}

/// POST /api/account/clear
///
/// 口令认证后清空余额（扣除手续费+准备金）回平台账户
#[utoipa::path(
    post,
    path = "/api/account/clear",
    request_body = ClearBalanceRequest,
    responses((status = 200, description = "Clear-balance transaction applied"))
)]
pub async fn clear_balance(
    State(state): State<AppState>,
    Json(req): Json<ClearBalanceRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, AppError> {
    let outcome = state
        .accounts
        .clear_balance(&req.address, &req.password)
        .await?;
    success_response(outcome.into())
}

/// GET /api/account/{address}/balance
#[utoipa::path(
    get,
    path = "/api/account/{address}/balance",
    params(("address" = String, Path, description = "Classic address")),
    responses((status = 200, description = "Account balance in drops"))
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<BalanceResponse>>, AppError> {
    let balance = state.accounts.get_balance(&address).await?;
    success_response(BalanceResponse {
        address,
        balance_drops: balance,
    })
}
