//! 账本地址编解码
//!
//! 经典地址 = base58(Ripple字母表) 编码的 [版本字节 ‖ 20字节账户ID ‖ 4字节校验和]，
//! 校验和取 SHA-256(SHA-256(payload)) 的前4字节。
//! 家族种子（secret）使用同样的编码，版本字节不同。

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// 账户地址版本字节（编码结果以 `r` 开头）
pub const ACCOUNT_ID_VERSION: u8 = 0x00;
/// secp256k1 家族种子版本字节（编码结果以 `s` 开头）
pub const FAMILY_SEED_VERSION: u8 = 0x21;

/// 经典地址长度下限/上限
pub const ADDRESS_MIN_LEN: usize = 25;
pub const ADDRESS_MAX_LEN: usize = 34;

/// 双SHA-256校验和，前4字节
fn checksum(payload: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

/// base58check 编码（Ripple字母表）
fn encode_base58check(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len() + 4);
    data.push(version);
    data.extend_from_slice(payload);
    let check = checksum(&data);
    data.extend_from_slice(&check);
    bs58::encode(data)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_string()
}

/// base58check 解码（Ripple字母表），校验版本字节、负载长度和校验和
fn decode_base58check(
    encoded: &str,
    expected_version: u8,
    expected_payload_len: usize,
) -> Result<Vec<u8>, CoreError> {
    let data = bs58::decode(encoded)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_vec()
        .map_err(|e| CoreError::Validation(format!("invalid base58 encoding: {}", e)))?;

    if data.len() != 1 + expected_payload_len + 4 {
        return Err(CoreError::Validation(format!(
            "invalid encoded length: {} bytes",
            data.len()
        )));
    }
    if data[0] != expected_version {
        return Err(CoreError::Validation(format!(
            "unexpected version byte: {:#04x}",
            data[0]
        )));
    }

    let (body, check) = data.split_at(data.len() - 4);
    if checksum(body) != check[..4] {
        return Err(CoreError::Validation("checksum mismatch".into()));
    }

    Ok(body[1..].to_vec())
}

/// 压缩公钥 → 20字节账户ID：RIPEMD-160(SHA-256(pubkey))
pub fn account_id_from_public_key(public_key: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(public_key);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// 20字节账户ID → 经典地址
pub fn encode_account_id(account_id: &[u8; 20]) -> String {
    encode_base58check(ACCOUNT_ID_VERSION, account_id)
}

/// 经典地址 → 20字节账户ID（长度/前缀/校验和全部验证）
pub fn decode_classic_address(address: &str) -> Result<[u8; 20], CoreError> {
    if address.len() < ADDRESS_MIN_LEN || address.len() > ADDRESS_MAX_LEN {
        return Err(CoreError::Validation(format!(
            "address length {} outside [{}, {}]",
            address.len(),
            ADDRESS_MIN_LEN,
            ADDRESS_MAX_LEN
        )));
    }
    if !address.starts_with('r') {
        return Err(CoreError::Validation(
            "classic address must start with 'r'".into(),
        ));
    }

    let payload = decode_base58check(address, ACCOUNT_ID_VERSION, 20)?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&payload);
    Ok(out)
}

/// 地址格式快速校验
pub fn is_valid_classic_address(address: &str) -> bool {
    decode_classic_address(address).is_ok()
}

/// 16字节种子熵 → 家族种子字符串（`s...`）
pub fn encode_seed(entropy: &[u8; 16]) -> String {
    encode_base58check(FAMILY_SEED_VERSION, entropy)
}

/// 家族种子字符串 → 16字节种子熵
pub fn decode_seed(secret: &str) -> Result<[u8; 16], CoreError> {
    let payload = decode_base58check(secret, FAMILY_SEED_VERSION, 16)?;
    let mut out = [0u8; 16];
    out.copy_from_slice(&payload);
    Ok(out)
}
