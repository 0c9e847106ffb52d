//! 钱包派生
//!
//! 两段式派生：先用 BIP32 从hex种子沿路径派生扩展私钥，
//! 再把私钥标量的前16字节按账本规范编码成家族种子（secret），
//! 从secret跑账本的规范 seed→keypair 派生得到最终密钥对和地址。
//! 纯函数：相同输入必得相同地址。

use coins_bip32::xkeys::{Parent, XPriv};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{FieldBytes, Scalar};
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::address_codec;
use crate::error::CoreError;

/// 硬化派生位
const HARDENED_OFFSET: u32 = 1 << 31;
/// 根密钥派生时的家族索引（账本规范固定为0）
const ROOT_FAMILY: u32 = 0;

/// 派生结果
///
/// 仅在调用期间存活（贷款登记会在内存中保留副本），永不落盘。
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Wallet {
    /// 经典地址
    pub address: String,
    /// 压缩公钥（hex）
    pub public_key: String,
    /// 私钥（hex）
    pub private_key: String,
    /// 家族种子字符串，签名提交时交给账本客户端
    pub secret: String,
}

// 日志脱敏：Debug 不打印私钥材料
impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// 钱包派生器
pub struct WalletDeriver;

impl WalletDeriver {
    pub fn new() -> Self {
        Self
    }

    /// 从 (hex种子, 派生路径) 派生钱包
    ///
    /// # Arguments
    /// * `seed_hex` - hex编码的种子熵（BIP39种子或任意熵）
    /// * `path` - 形如 `m/44'/144'/0'/0/0`，`'` 后缀表示硬化
    pub fn derive(&self, seed_hex: &str, path: &str) -> Result<Wallet, CoreError> {
        if seed_hex.is_empty() {
            return Err(CoreError::Derivation("seed must not be empty".into()));
        }
        let seed = hex::decode(seed_hex)
            .map_err(|e| CoreError::Derivation(format!("seed is not valid hex: {}", e)))?;

        let indices = parse_path(path)?;

        // BIP32: 种子 → 主扩展私钥 → 逐级子派生
        let master = XPriv::root_from_seed(&seed, None)
            .map_err(|e| CoreError::Derivation(format!("master key derivation failed: {}", e)))?;

        let mut node = master;
        for index in indices {
            node = node.derive_child(index).map_err(|e| {
                CoreError::Derivation(format!("child derivation failed at {}: {}", index, e))
            })?;
        }

        // 终端扩展私钥的标量 → 家族种子熵（前16字节）
        let signing_key: &SigningKey = node.as_ref();
        let private_scalar = signing_key.to_bytes();
        let mut entropy = [0u8; 16];
        entropy.copy_from_slice(&private_scalar[..16]);

        let secret = address_codec::encode_seed(&entropy);

        // 账本规范 seed→keypair 派生
        let (account_private, account_public) = derive_keypair(&entropy)?;
        let account_id = address_codec::account_id_from_public_key(&account_public);
        let address = address_codec::encode_account_id(&account_id);

        Ok(Wallet {
            address,
            public_key: hex::encode_upper(account_public),
            private_key: hex::encode_upper(account_private),
            secret,
        })
    }
}

impl Default for WalletDeriver {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析派生路径为子索引序列
///
/// 根标记 `m/` 之后按 `/` 切分；每段是十进制整数，可带 `'` 硬化后缀。
fn parse_path(path: &str) -> Result<Vec<u32>, CoreError> {
    if path.is_empty() {
        return Err(CoreError::Derivation("derivation path is empty".into()));
    }

    let rest = path
        .strip_prefix("m/")
        .or_else(|| path.strip_prefix("M/"))
        .ok_or_else(|| {
            CoreError::Derivation(format!("path '{}' missing root marker 'm/'", path))
        })?;

    let mut indices = Vec::new();
    for segment in rest.split('/') {
        if segment.is_empty() {
            return Err(CoreError::Derivation(format!(
                "path '{}' contains an empty segment",
                path
            )));
        }
        let (digits, hardened) = match segment.strip_suffix('\'').or_else(|| segment.strip_suffix('h'))
        {
            Some(d) => (d, true),
            None => (segment, false),
        };
        let index: u32 = digits.parse().map_err(|_| {
            CoreError::Derivation(format!("path segment '{}' is not a decimal integer", segment))
        })?;
        if index >= HARDENED_OFFSET {
            return Err(CoreError::Derivation(format!(
                "path segment '{}' exceeds the hardened offset",
                segment
            )));
        }
        indices.push(if hardened { index + HARDENED_OFFSET } else { index });
    }

    Ok(indices)
}

/// SHA-512 取前半（账本派生规范使用的哈希）
fn sha512_half(chunks: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha512::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

/// 反复哈希直到得到合法的非零曲线标量
fn scalar_from_sequence(prefix: &[&[u8]]) -> Result<Scalar, CoreError> {
    for counter in 0u32..=0xFFFF {
        let counter_bytes = counter.to_be_bytes();
        let mut chunks: Vec<&[u8]> = prefix.to_vec();
        chunks.push(&counter_bytes);
        let candidate = sha512_half(&chunks);

        let maybe: Option<Scalar> =
            Scalar::from_repr(FieldBytes::clone_from_slice(&candidate)).into();
        if let Some(scalar) = maybe {
            if !bool::from(scalar.is_zero()) {
                return Ok(scalar);
            }
        }
    }
    Err(CoreError::Derivation(
        "no valid scalar found within sequence bound".into(),
    ))
}

/// 账本规范的 seed→keypair 派生（secp256k1）
///
/// 根标量 = H(entropy ‖ seq)，中间标量 = H(rootPub ‖ family ‖ seq)，
/// 账户私钥 = (根 + 中间) mod n。
fn derive_keypair(entropy: &[u8; 16]) -> Result<([u8; 32], [u8; 33]), CoreError> {
    let root_scalar = scalar_from_sequence(&[entropy])?;
    let root_key = SigningKey::from_bytes(&root_scalar.to_repr())
        .map_err(|e| CoreError::Derivation(format!("root key rejected: {}", e)))?;
    let root_public = root_key.verifying_key().to_encoded_point(true);

    let family = ROOT_FAMILY.to_be_bytes();
    let mid_scalar = scalar_from_sequence(&[root_public.as_bytes(), &family])?;

    let account_scalar = root_scalar + mid_scalar;
    if bool::from(account_scalar.is_zero()) {
        return Err(CoreError::Derivation("degenerate account scalar".into()));
    }

    let account_key = SigningKey::from_bytes(&account_scalar.to_repr())
        .map_err(|e| CoreError::Derivation(format!("account key rejected: {}", e)))?;
    let account_public = account_key.verifying_key().to_encoded_point(true);

    let mut private = [0u8; 32];
    private.copy_from_slice(&account_scalar.to_repr());
    let mut public = [0u8; 33];
    public.copy_from_slice(account_public.as_bytes());

    Ok((private, public))
}
