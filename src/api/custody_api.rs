//! 托管迁移 API
//! 仓单代币在 借款人/出借人/仓库 之间的六个状态迁移（±贷款）

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    api::{
        account_api::TransactionView,
        response::{success_response, ApiResponse},
    },
    app_state::AppState,
    error::AppError,
    service::loan_workflow::PartyCredentials,
};

/// 双方参与的迁移请求（借款人 + 出借人）
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CustodyTransitionRequest {
    /// 仓单代币发行ID（48个hex字符）
    pub token_id: String,
    pub owner_address: String,
    pub owner_password: String,
    pub creditor_address: String,
    pub creditor_password: String,
}

/// 仅出借人参与的迁移请求（回仓库）
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct WarehouseTransitionRequest {
    pub token_id: String,
    pub creditor_address: String,
    pub creditor_password: String,
}

impl CustodyTransitionRequest {
    fn owner(&self) -> PartyCredentials {
        PartyCredentials {
            address: self.owner_address.clone(),
            password: self.owner_password.clone(),
        }
    }

    fn creditor(&self) -> PartyCredentials {
        PartyCredentials {
            address: self.creditor_address.clone(),
            password: self.creditor_password.clone(),
        }
    }
}

impl WarehouseTransitionRequest {
    fn creditor(&self) -> PartyCredentials {
        PartyCredentials {
            address: self.creditor_address.clone(),
            password: self.creditor_password.clone(),
        }
    }
}

/// POST /api/custody/issue
///
/// 仓单移交出借人（无贷款）
#[utoipa::path(
    post,
    path = "/api/custody/issue",
    request_body = CustodyTransitionRequest,
    responses((status = 200, description = "Warrant transferred to creditor"))
)]
pub async fn issue_to_creditor(
    State(state): State<AppState>,
    Json(req): Json<CustodyTransitionRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, AppError> {
    let outcome = state
        .workflow
        .issue_to_creditor(&req.token_id, &req.owner(), &req.creditor())
        .await?;
    success_response(outcome.into())
}

/// POST /api/custody/issue-with-loan
///
/// 仓单移交出借人并放款
#[utoipa::path(
    post,
    path = "/api/custody/issue-with-loan",
    request_body = CustodyTransitionRequest,
    responses((status = 200, description = "Warrant escrowed and loan registered"))
)]
pub async fn issue_to_creditor_with_loan(
    State(state): State<AppState>,
    Json(req): Json<CustodyTransitionRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, AppError> {
    let outcome = state
        .workflow
        .issue_to_creditor_with_loan(&req.token_id, &req.owner(), &req.creditor())
        .await?;
    success_response(outcome.into())
}

/// POST /api/custody/buyout
///
/// 借款人买回仓单（无贷款）
#[utoipa::path(
    post,
    path = "/api/custody/buyout",
    request_body = CustodyTransitionRequest,
    responses((status = 200, description = "Warrant returned to owner"))
)]
pub async fn buyout_from_creditor(
    State(state): State<AppState>,
    Json(req): Json<CustodyTransitionRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, AppError> {
    let outcome = state
        .workflow
        .buyout_from_creditor(&req.token_id, &req.owner(), &req.creditor())
        .await?;
    success_response(outcome.into())
}

/// POST /api/custody/buyout-with-loan
///
/// 借款人还本买断贷款并赎回仓单
#[utoipa::path(
    post,
    path = "/api/custody/buyout-with-loan",
    request_body = CustodyTransitionRequest,
    responses((status = 200, description = "Loan settled, warrant returned"))
)]
pub async fn buyout_from_creditor_with_loan(
    State(state): State<AppState>,
    Json(req): Json<CustodyTransitionRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, AppError> {
    let outcome = state
        .workflow
        .buyout_from_creditor_with_loan(&req.token_id, &req.owner(), &req.creditor())
        .await?;
    success_response(outcome.into())
}

/// POST /api/custody/warehouse
///
/// 仓单回仓库赎回（无贷款）；仓库地址由发行ID反解
#[utoipa::path(
    post,
    path = "/api/custody/warehouse",
    request_body = WarehouseTransitionRequest,
    responses((status = 200, description = "Warrant returned to warehouse"))
)]
pub async fn transfer_to_warehouse(
    State(state): State<AppState>,
    Json(req): Json<WarehouseTransitionRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, AppError> {
    let outcome = state
        .workflow
        .transfer_to_warehouse(&req.token_id, &req.creditor())
        .await?;
    success_response(outcome.into())
}

/// POST /api/custody/warehouse-with-loan
///
/// 违约处置：仓单回仓库，贷款注销
#[utoipa::path(
    post,
    path = "/api/custody/warehouse-with-loan",
    request_body = WarehouseTransitionRequest,
    responses((status = 200, description = "Loan written off, warrant returned to warehouse"))
)]
pub async fn transfer_to_warehouse_with_loan(
    State(state): State<AppState>,
    Json(req): Json<WarehouseTransitionRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, AppError> {
    let outcome = state
        .workflow
        .transfer_to_warehouse_with_loan(&req.token_id, &req.creditor())
        .await?;
    success_response(outcome.into())
}
