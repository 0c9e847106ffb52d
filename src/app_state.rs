use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    domain::derivation::WalletDeriver,
    infrastructure::ledger_rpc::LedgerApi,
    service::{
        account_service::AccountService, loan_registry::LoanRegistry, loan_workflow::LoanWorkflow,
        tx_gateway::TransactionGateway,
    },
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<TransactionGateway>,
    pub registry: Arc<LoanRegistry>,
    pub deriver: Arc<WalletDeriver>,
    pub workflow: Arc<LoanWorkflow>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    /// 创建新的应用状态
    ///
    /// 账本客户端从外部传入：生产环境是JSON-RPC客户端，测试注入内存实现。
    pub fn new(config: Arc<Config>, client: Arc<dyn LedgerApi>) -> Self {
        let gateway = Arc::new(TransactionGateway::new(
            client,
            Duration::from_secs(config.ledger.finality_timeout_secs),
            Duration::from_millis(config.ledger.poll_interval_ms),
        ));
        let registry = Arc::new(LoanRegistry::new());
        let deriver = Arc::new(WalletDeriver::new());

        let workflow = Arc::new(LoanWorkflow::new(
            gateway.clone(),
            registry.clone(),
            deriver.clone(),
            config.loan.clone(),
            config.ledger.clone(),
        ));
        let accounts = Arc::new(AccountService::new(
            gateway.clone(),
            deriver.clone(),
            config.ledger.clone(),
        ));

        Self {
            config,
            gateway,
            registry,
            deriver,
            workflow,
            accounts,
        }
    }
}
