//! 资格引擎枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 门控类型
///
/// 决定活动资格的判定方式，评估器按该标签分发到对应的检查器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum GatingType {
    /// 无门槛 - 所有人可参与
    #[default]
    None,
    /// 身份白名单 - 按用户 ID 精确匹配
    IdentityWhitelist,
    /// 钱包白名单 - 按钱包地址匹配（大小写归一）
    WalletWhitelist,
    /// NFT 持有 - 链上持有量达标
    NftHolding,
    /// 代币余额 - 链上余额达标
    TokenBalance,
    /// 组合条件 - 多个子检查的 AND 组合
    Combined,
    /// 会员标记 - 身份记录上的布尔属性
    MembershipFlag,
}

/// 活动适用范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum CampaignScope {
    /// 全站 - 任何商品请求均适用
    #[default]
    SiteWide,
    /// 指定商品 - 仅当请求命中目标商品集合时适用
    ProductSpecific,
}

/// NFT 标准
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum NftStandard {
    /// ERC-721 - 每地址一次 balanceOf
    Erc721,
    /// ERC-1155 - 按 token id 集合逐一查询并求和
    Erc1155,
}
