//! 规则预言机与局面校验器的 HTTP 客户端
//!
//! 所有端点均为 `POST {base_url}/<op>`，请求与响应都是 JSON。
//! 任何传输、状态码或解码失败都映射为 `MutinyError::ExternalUnavailable`，
//! 由调用方决定是否重试。

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use mt_core::board::{BoardHandle, BoardSituation, RiskAssessment};
use mt_core::square::Square;
use mt_core::{MutinyError, Result};
use mt_engine::{BoardTruthChecker, LegalityOracle};

/// 外部协作方客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleClientConfig {
    /// 规则预言机地址
    pub legality_url: String,
    /// 局面校验器地址
    pub truth_url: String,
    pub request_timeout_ms: u64,
}

impl Default for OracleClientConfig {
    fn default() -> Self {
        Self {
            legality_url: "http://127.0.0.1:8091".to_string(),
            truth_url: "http://127.0.0.1:8092".to_string(),
            request_timeout_ms: 3_000,
        }
    }
}

impl OracleClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Deserialize)]
struct BoardResponse {
    board: BoardHandle,
}

#[derive(Deserialize)]
struct LegalResponse {
    legal: bool,
}

#[derive(Deserialize)]
struct AccuracyResponse {
    accuracy: f64,
}

/// JSON POST 客户端，按协作方名称记录失败
struct JsonEndpoint {
    name: &'static str,
    base_url: String,
    client: reqwest::Client,
}

impl JsonEndpoint {
    fn new(name: &'static str, base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn unavailable(&self, op: &str, reason: impl std::fmt::Display) -> MutinyError {
        tracing::warn!(collaborator = self.name, op, error = %reason, "External call failed");
        MutinyError::ExternalUnavailable(format!("{} {op}: {reason}", self.name))
    }

    async fn post<R: DeserializeOwned>(&self, op: &str, body: serde_json::Value) -> Result<R> {
        let url = format!("{}/{op}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unavailable(op, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(self.unavailable(op, format!("status {}", status.as_u16())));
        }

        resp.json::<R>().await.map_err(|e| self.unavailable(op, e))
    }
}

/// 通过 HTTP 调用外部规则预言机
pub struct HttpLegalityOracle {
    endpoint: JsonEndpoint,
}

impl HttpLegalityOracle {
    pub fn new(config: &OracleClientConfig) -> Self {
        Self {
            endpoint: JsonEndpoint::new(
                "legality-oracle",
                &config.legality_url,
                config.request_timeout(),
            ),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }
}

#[async_trait]
impl LegalityOracle for HttpLegalityOracle {
    async fn start_position(&self) -> Result<BoardHandle> {
        let resp: BoardResponse = self.endpoint.post("start", json!({})).await?;
        Ok(resp.board)
    }

    async fn is_legal(&self, board: &BoardHandle, from: Square, to: Square) -> Result<bool> {
        let resp: LegalResponse = self
            .endpoint
            .post("legal", json!({ "board": board, "from": from, "to": to }))
            .await?;
        Ok(resp.legal)
    }

    async fn apply(&self, board: &BoardHandle, from: Square, to: Square) -> Result<BoardHandle> {
        let resp: BoardResponse = self
            .endpoint
            .post("apply", json!({ "board": board, "from": from, "to": to }))
            .await?;
        Ok(resp.board)
    }

    async fn risk_of(
        &self,
        board: &BoardHandle,
        from: Square,
        to: Square,
    ) -> Result<RiskAssessment> {
        self.endpoint
            .post("risk", json!({ "board": board, "from": from, "to": to }))
            .await
    }

    async fn situation(&self, board: &BoardHandle) -> Result<BoardSituation> {
        self.endpoint
            .post("situation", json!({ "board": board }))
            .await
    }
}

/// 通过 HTTP 调用外部局面校验器
pub struct HttpBoardTruthChecker {
    endpoint: JsonEndpoint,
}

impl HttpBoardTruthChecker {
    pub fn new(config: &OracleClientConfig) -> Self {
        Self {
            endpoint: JsonEndpoint::new("board-truth", &config.truth_url, config.request_timeout()),
        }
    }
}

#[async_trait]
impl BoardTruthChecker for HttpBoardTruthChecker {
    async fn verify_claim(&self, board: &BoardHandle, claim: &str) -> Result<f64> {
        let resp: AccuracyResponse = self
            .endpoint
            .post("verify", json!({ "board": board, "claim": claim }))
            .await?;
        Ok(resp.accuracy.clamp(0.0, 1.0))
    }
}
