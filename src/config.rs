use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::HatzClient;
use crate::error::HatzError;
use crate::http::DynHttpTransport;

/// 默认服务地址
pub const DEFAULT_BASE_URL: &str = "https://ai.hatz.ai";
/// 默认鉴权 header
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-KEY";

pub const ENV_API_KEY: &str = "HATZ_API_KEY";
pub const ENV_BASE_URL: &str = "HATZ_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "HATZ_TIMEOUT_SECS";

/// 客户端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: String,
    /// 携带 API Key 的 header 名称
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// 单次请求超时 秒 留空时使用 transport 默认值
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

impl ClientConfig {
    /// 使用默认地址创建配置
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            api_key: api_key.into(),
            api_key_header: default_api_key_header(),
            timeout_secs: None,
        }
    }

    /// 自定义 base_url
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 自定义鉴权 header
    pub fn with_api_key_header(mut self, header: impl Into<String>) -> Self {
        self.api_key_header = header.into();
        self
    }

    /// 设置请求超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// 从环境变量读取配置
    ///
    /// `HATZ_API_KEY` is required; `HATZ_BASE_URL` and `HATZ_TIMEOUT_SECS` are
    /// optional. Blank values count as unset.
    pub fn from_env() -> Result<Self, HatzError> {
        let api_key = load_env_var(ENV_API_KEY).ok_or_else(|| HatzError::InvalidConfig {
            field: "api_key".to_string(),
            reason: format!("{ENV_API_KEY} is not set"),
        })?;
        let mut config = Self::new(api_key);
        if let Some(base_url) = load_env_var(ENV_BASE_URL) {
            config = config.with_base_url(base_url);
        }
        if let Some(raw) = load_env_var(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|err| HatzError::InvalidConfig {
                field: "timeout_secs".to_string(),
                reason: format!("{ENV_TIMEOUT_SECS}={raw:?} is not a number of seconds: {err}"),
            })?;
            config.timeout_secs = Some(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), HatzError> {
        if self.api_key.trim().is_empty() {
            return Err(invalid("api_key", "must not be empty"));
        }
        if self.api_key_header.trim().is_empty() {
            return Err(invalid("api_key_header", "must not be empty"));
        }
        let base = self.base_url.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(invalid("base_url", "must start with http:// or https://"));
        }
        if self.timeout_secs == Some(0) {
            return Err(invalid("timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> HatzError {
    HatzError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn load_env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// 根据配置构建 HatzClient
pub fn build_client(
    config: &ClientConfig,
    transport: DynHttpTransport,
) -> Result<HatzClient, HatzError> {
    config.validate()?;
    let mut client = HatzClient::new(transport, config.api_key.trim())
        .with_base_url(config.base_url.trim())
        .with_api_key_header(config.api_key_header.clone());
    if let Some(timeout) = config.timeout() {
        client = client.with_timeout(timeout);
    }
    Ok(client)
}
