//! 贷款登记簿
//!
//! 抵押代币ID → 贷款 的内存映射，同一代币最多一笔在册贷款。
//! 请求路径和计息任务都会改写它；写操作全部经过内部 RwLock，
//! 依赖提交结果的写入由调用方在网关锁内完成。

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::domain::loan::Loan;
use crate::error::CoreError;

/// 贷款登记簿
pub struct LoanRegistry {
    loans: RwLock<HashMap<String, Loan>>,
}

impl LoanRegistry {
    pub fn new() -> Self {
        Self {
            loans: RwLock::new(HashMap::new()),
        }
    }

    /// 登记一笔贷款；同一抵押代币重复登记被拒绝
    pub async fn add_loan(&self, token_id: &str, loan: Loan) -> Result<(), CoreError> {
        let mut loans = self.loans.write().await;
        if loans.contains_key(token_id) {
            return Err(CoreError::Validation(format!(
                "loan already registered for token {}",
                token_id
            )));
        }
        loans.insert(token_id.to_string(), loan);
        Ok(())
    }

    /// 查询贷款（副本）
    pub async fn get_loan(&self, token_id: &str) -> Result<Loan, CoreError> {
        self.loans
            .read()
            .await
            .get(token_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("loan for token {}", token_id)))
    }

    /// 移除贷款（买断/违约/赎回）
    pub async fn remove_loan(&self, token_id: &str) -> Result<(), CoreError> {
        self.loans
            .write()
            .await
            .remove(token_id)
            .map(|_| ())
            .ok_or_else(|| CoreError::NotFound(format!("loan for token {}", token_id)))
    }

    /// 在册贷款数
    pub async fn len(&self) -> usize {
        self.loans.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.loans.read().await.is_empty()
    }

    /// 到期待计息的贷款快照（token_id + 副本）
    pub async fn due_loans(&self, now: DateTime<Utc>) -> Vec<(String, Loan)> {
        self.loans
            .read()
            .await
            .iter()
            .filter(|(_, loan)| loan.next_payment <= now)
            .map(|(id, loan)| (id.clone(), loan.clone()))
            .collect()
    }

    /// 把某笔贷款的下次计息时间推进一个周期
    ///
    /// 贷款可能已在并发路径上被移除；此时静默返回 false。
    pub async fn advance_next_payment(&self, token_id: &str, period: Duration) -> bool {
        let mut loans = self.loans.write().await;
        match loans.get_mut(token_id) {
            Some(loan) => {
                loan.next_payment += period;
                true
            }
            None => false,
        }
    }
}

impl Default for LoanRegistry {
    fn default() -> Self {
        Self::new()
    }
}
