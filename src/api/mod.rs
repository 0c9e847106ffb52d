//! API 模块
//! 路由、OpenAPI 文档和健康检查

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::app_state::AppState;

pub mod account_api;
pub mod custody_api;
pub mod loan_api;
pub mod response; // 统一响应格式

#[derive(OpenApi)]
#[openapi(
    paths(
        account_api::create_account,
        account_api::deposit,
        account_api::clear_balance,
        account_api::get_balance,
        custody_api::issue_to_creditor,
        custody_api::issue_to_creditor_with_loan,
        custody_api::buyout_from_creditor,
        custody_api::buyout_from_creditor_with_loan,
        custody_api::transfer_to_warehouse,
        custody_api::transfer_to_warehouse_with_loan,
        loan_api::get_loan,
    ),
    components(schemas(
        account_api::CreateAccountRequest,
        account_api::CreateAccountResponse,
        account_api::DepositRequest,
        account_api::ClearBalanceRequest,
        account_api::TransactionView,
        account_api::BalanceResponse,
        custody_api::CustodyTransitionRequest,
        custody_api::WarehouseTransitionRequest,
        loan_api::LoanView,
    )),
    tags(
        (name = "warrantcore", description = "Warrant-collateralized lending core API")
    )
)]
pub struct ApiDoc;

/// GET /healthz
///
/// 存活检查 + 账本连通性
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    match state.gateway.get_fee_and_reserve().await {
        Ok(_) => Json(json!({ "status": "ok", "ledger": "reachable" })),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: ledger unreachable");
            Json(json!({ "status": "degraded", "ledger": "unreachable" }))
        }
    }
}

/// 构建应用路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/account", post(account_api::create_account))
        .route("/api/account/deposit", post(account_api::deposit))
        .route("/api/account/clear", post(account_api::clear_balance))
        .route(
            "/api/account/:address/balance",
            get(account_api::get_balance),
        )
        .route("/api/custody/issue", post(custody_api::issue_to_creditor))
        .route(
            "/api/custody/issue-with-loan",
            post(custody_api::issue_to_creditor_with_loan),
        )
        .route("/api/custody/buyout", post(custody_api::buyout_from_creditor))
        .route(
            "/api/custody/buyout-with-loan",
            post(custody_api::buyout_from_creditor_with_loan),
        )
        .route(
            "/api/custody/warehouse",
            post(custody_api::transfer_to_warehouse),
        )
        .route(
            "/api/custody/warehouse-with-loan",
            post(custody_api::transfer_to_warehouse_with_loan),
        )
        .route("/api/loans/:token_id", get(loan_api::get_loan))
        .merge(utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(
            tower::ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
