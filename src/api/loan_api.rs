//! 贷款查询 API

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    error::AppError,
};

/// 贷款只读视图（不暴露钱包材料）
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoanView {
    pub token_id: String,
    #[schema(value_type = String)]
    pub principal: rust_decimal::Decimal,
    #[schema(value_type = String)]
    pub annual_rate_percent: rust_decimal::Decimal,
    pub currency: String,
    pub debt_token_id: String,
    pub borrower: String,
    pub lender: String,
    pub next_payment: DateTime<Utc>,
}

/// GET /api/loans/{token_id}
#[utoipa::path(
    get,
    path = "/api/loans/{token_id}",
    params(("token_id" = String, Path, description = "Collateral token issuance id")),
    responses(
        (status = 200, description = "Registered loan"),
        (status = 404, description = "No loan registered for token"),
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Result<Json<ApiResponse<LoanView>>, AppError> {
    let loan = state.registry.get_loan(&token_id).await?;

    success_response(LoanView {
        token_id,
        principal: loan.principal,
        annual_rate_percent: loan.annual_rate_percent,
        currency: loan.currency.clone(),
        debt_token_id: loan.debt_token_id.clone(),
        borrower: loan.owner_wallet.address.clone(),
        lender: loan.creditor_wallet.address.clone(),
        next_payment: loan.next_payment,
    })
}
