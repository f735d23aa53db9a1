//! balance-of 调用的 ABI 编解码
//!
//! 只覆盖本系统用到的三种只读调用：ERC-20 balanceOf(address)、
//! ERC-721 balanceOf(address)（选择子相同）、ERC-1155
//! balanceOf(address,uint256)。返回值统一为单个 uint256。

use alloy_primitives::{Address, U256, hex};
use rust_decimal::Decimal;

use crate::error::{ResolverError, Result};

/// balanceOf(address) 选择子，ERC-20 与 ERC-721 共用
pub const SELECTOR_BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// balanceOf(address,uint256) 选择子，ERC-1155
pub const SELECTOR_BALANCE_OF_ID: [u8; 4] = [0x00, 0xfd, 0xd5, 0x8e];

/// 默认代币精度
pub const DEFAULT_DECIMALS: u32 = 18;

/// 编码 balanceOf(owner) 调用数据
pub fn encode_balance_of(owner: Address) -> String {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&SELECTOR_BALANCE_OF);
    data.extend_from_slice(owner.into_word().as_slice());
    format!("0x{}", hex::encode(data))
}

/// 编码 balanceOf(owner, token_id) 调用数据
pub fn encode_balance_of_id(owner: Address, token_id: U256) -> String {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&SELECTOR_BALANCE_OF_ID);
    data.extend_from_slice(owner.into_word().as_slice());
    data.extend_from_slice(&token_id.to_be_bytes::<32>());
    format!("0x{}", hex::encode(data))
}

/// 解码单个 uint256 返回值
pub fn decode_uint(result: &str) -> Result<U256> {
    let stripped = result.trim_start_matches("0x");
    if stripped.is_empty() {
        return Err(ResolverError::Malformed(
            "eth_call 返回了空数据".to_string(),
        ));
    }

    U256::from_str_radix(stripped, 16)
        .map_err(|e| ResolverError::Malformed(format!("无法解析 uint256 返回值: {}", e)))
}

/// 将定点整数金额按精度转换为十进制
///
/// Decimal 的尾数上限为 96 位，精度上限为 28 位小数，
/// 超出范围的金额显式报错而不是静默截断。
pub fn to_decimal(amount: U256, decimals: u32) -> Result<Decimal> {
    if decimals > 28 {
        return Err(ResolverError::Config(format!(
            "代币精度 {} 超出 Decimal 支持范围",
            decimals
        )));
    }

    if amount.bit_len() > 96 {
        return Err(ResolverError::AmountOutOfRange(amount.to_string()));
    }

    let mantissa: u128 = amount.to::<u128>();
    Ok(Decimal::from_i128_with_scale(mantissa as i128, decimals))
}

/// 解析十进制 token id 字符串
pub fn parse_token_id(raw: &str) -> Result<U256> {
    U256::from_str_radix(raw.trim(), 10)
        .map_err(|e| ResolverError::Config(format!("无效的 token id '{}': {}", raw, e)))
}
