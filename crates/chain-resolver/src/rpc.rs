//! JSON-RPC 读取客户端
//!
//! 通过 `ChainReader` trait 抽象链上只读调用，便于服务层依赖抽象
//! 并在测试中注入脚本化实现。生产实现基于 reqwest 发送
//! JSON-RPC 2.0 `eth_call` 请求。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ResolverError, Result};

/// 链上只读调用接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// 对指定端点发起 eth_call
    ///
    /// `data` 与返回值均为 0x 前缀的十六进制串。
    async fn call(&self, endpoint: &str, to: &str, data: &str) -> Result<String>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// 基于 reqwest 的 ChainReader 实现
#[derive(Clone)]
pub struct HttpChainReader {
    client: reqwest::Client,
}

impl HttpChainReader {
    /// 创建客户端，单次请求超时由配置给定
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ResolverError::Config(format!("HTTP 客户端构建失败: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ChainReader for HttpChainReader {
    async fn call(&self, endpoint: &str, to: &str, data: &str) -> Result<String> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: json!([{ "to": to, "data": data }, "latest"]),
        };

        let response = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ResolverError::TransientNetwork(e.to_string()))?;

        // 429 单独分类，便于退避与端点轮换策略区别对待
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ResolverError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }

        if !response.status().is_success() {
            return Err(ResolverError::TransientNetwork(format!(
                "HTTP {} from {}",
                response.status(),
                endpoint
            )));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ResolverError::Malformed(format!("JSON-RPC 响应解析失败: {}", e)))?;

        if let Some(err) = body.error {
            return Err(ResolverError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        body.result
            .ok_or_else(|| ResolverError::Malformed("JSON-RPC 响应缺少 result 字段".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_shape() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: json!([{ "to": "0xabc", "data": "0x70a08231" }, "latest"]),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "eth_call");
        assert_eq!(value["params"][1], "latest");
    }

    #[test]
    fn test_response_with_error_body() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"header not found"}}"#;
        let parsed: JsonRpcResponse = serde_json::from_str(raw).unwrap();

        assert!(parsed.result.is_none());
        let err = parsed.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "header not found");
    }

    #[test]
    fn test_response_with_result() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":"0x0000000000000000000000000000000000000000000000000000000000000001"}"#;
        let parsed: JsonRpcResponse = serde_json::from_str(raw).unwrap();

        assert!(parsed.error.is_none());
        assert!(parsed.result.unwrap().starts_with("0x"));
    }
}
