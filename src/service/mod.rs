pub mod account_service;
pub mod interest_accrual; // 后台计息任务（watch通道停机）
pub mod loan_registry;
pub mod loan_workflow;
pub mod tx_gateway;
