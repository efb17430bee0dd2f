//! 外部裁决能力 (AI) 的传输层

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::request::JudgmentRequest;
use crate::usage::TokenUsage;
use crate::verdict::Verdict;

/// 裁决能力错误
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Judgment capability not configured")]
    Unavailable,
}

/// 附带 token 用量的裁决
#[derive(Debug, Clone)]
pub struct MeteredVerdict {
    pub verdict: Verdict,
    pub usage: Option<TokenUsage>,
}

/// 裁决能力
#[async_trait]
pub trait JudgmentCapability: Send + Sync {
    /// 能力名称 (用于日志)
    fn name(&self) -> &str;

    /// 是否值得尝试调用 (不可用时网关直接走兜底，不占预算也不计熔断)
    fn is_available(&self) -> bool {
        true
    }

    /// 发起一次裁决调用
    async fn call(&self, request: &JudgmentRequest) -> Result<Verdict, CapabilityError>;

    /// 发起调用并报告用量；默认不计量
    async fn call_metered(
        &self,
        request: &JudgmentRequest,
    ) -> Result<MeteredVerdict, CapabilityError> {
        Ok(MeteredVerdict {
            verdict: self.call(request).await?,
            usage: None,
        })
    }
}

/// HTTP 裁决能力配置
#[derive(Debug, Clone)]
pub struct HttpCapabilityConfig {
    /// POST 目标地址
    pub endpoint: String,
    /// 可选的 Bearer Token
    pub api_key: Option<String>,
    /// 传输层超时 (网关另有独立超时)
    pub request_timeout: Duration,
}

impl Default for HttpCapabilityConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8090/judge".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct JudgeResponse {
    verdict: Verdict,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

/// 通过 HTTP POST `{kind, context}` 调用外部裁决服务，解析 `{verdict, usage?}`
pub struct HttpJudgmentCapability {
    config: HttpCapabilityConfig,
    client: reqwest::Client,
}

impl HttpJudgmentCapability {
    pub fn new(config: HttpCapabilityConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl JudgmentCapability for HttpJudgmentCapability {
    fn name(&self) -> &str {
        "http"
    }

    async fn call(&self, request: &JudgmentRequest) -> Result<Verdict, CapabilityError> {
        Ok(self.call_metered(request).await?.verdict)
    }

    async fn call_metered(
        &self,
        request: &JudgmentRequest,
    ) -> Result<MeteredVerdict, CapabilityError> {
        let mut builder = self.client.post(&self.config.endpoint).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapabilityError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: JudgeResponse = resp
            .json()
            .await
            .map_err(|e| CapabilityError::Decode(e.to_string()))?;
        Ok(MeteredVerdict {
            verdict: parsed.verdict,
            usage: parsed.usage,
        })
    }
}

/// 永远不可用的能力，系统完全依靠兜底裁决运行
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCapability;

#[async_trait]
impl JudgmentCapability for UnavailableCapability {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn call(&self, _request: &JudgmentRequest) -> Result<Verdict, CapabilityError> {
        Err(CapabilityError::Unavailable)
    }
}
