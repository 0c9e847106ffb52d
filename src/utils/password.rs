//! 密码解析工具
//!
//! 所有对外口令形如 `<hexSeed>-<derivationIndex>`：
//! 恰好两段、两段非空、索引为十进制数字，否则拒绝。

use crate::error::CoreError;

/// 解析结果：hex种子 + 派生索引
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPassword {
    pub seed_hex: String,
    pub index: u32,
}

/// 解析 `<hexSeed>-<index>` 口令
pub fn parse_password(password: &str) -> Result<ParsedPassword, CoreError> {
    if password.is_empty() {
        return Err(CoreError::InvalidPassword("password is empty".into()));
    }

    let parts: Vec<&str> = password.split('-').collect();
    if parts.len() != 2 {
        return Err(CoreError::InvalidPassword(format!(
            "expected exactly 2 dash-separated parts, got {}",
            parts.len()
        )));
    }
    if parts[0].is_empty() || parts[1].is_empty() {
        return Err(CoreError::InvalidPassword(
            "password parts must be non-empty".into(),
        ));
    }

    let index: u32 = parts[1].parse().map_err(|_| {
        CoreError::InvalidPassword(format!("derivation index '{}' is not numeric", parts[1]))
    })?;

    Ok(ParsedPassword {
        seed_hex: parts[0].to_string(),
        index,
    })
}

/// 索引 → 账户级派生路径
pub fn derivation_path_for_index(index: u32) -> String {
    format!("m/44'/144'/{}'/0/0", index)
}
