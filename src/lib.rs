//! warrantcore - 仓单抵押借贷核心服务
//!
//! 借款人把仓单代币托管给出借人换取稳定币贷款，
//! 按周期自动计息，直到买断、赎回或违约。
//! 钱包与贷款登记都只存在内存里，账本是唯一持久层。

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode, CoreError};

// 统一模块导出
pub mod prelude {
    pub use crate::{
        app_state::AppState,
        domain::{Wallet, WalletDeriver},
        error::{AppError, AppErrorCode, CoreError},
        service::{
            loan_registry::LoanRegistry,
            loan_workflow::{LoanWorkflow, PartyCredentials},
            tx_gateway::TransactionGateway,
        },
    };
}
