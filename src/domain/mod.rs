//! Domain 模块
//!
//! 包含核心业务逻辑和领域模型

pub mod address_codec;
pub mod derivation;
pub mod loan;
pub mod token_metadata;

// Re-exports
// 重新导出常用类型
pub use derivation::{Wallet, WalletDeriver};
pub use loan::Loan;
pub use token_metadata::{DebtTerms, TokenMetadata};
