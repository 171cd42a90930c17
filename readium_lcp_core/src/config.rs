//! 客户端配置
//!
//! 许可证服务器与许可证状态服务器各用一份配置。环境变量按前缀读取，
//! 约定 `LCP_*` 为许可证服务器，`LSD_*` 为许可证状态服务器。

use std::fmt;

use url::Url;

use crate::error::{Error, Result};

/// 客户端配置
#[derive(Clone)]
pub struct ClientConfig {
    /// 服务器 URL
    pub server_url: String,
    /// Basic 认证用户名
    pub username: String,
    /// Basic 认证密码
    pub password: String,
    /// 请求超时（秒）
    pub timeout: u64,
    /// 是否验证 TLS 证书
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8989".to_string(),
            username: String::new(),
            password: String::new(),
            timeout: 30,
            verify_tls: true,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// 从环境变量读取配置
    ///
    /// - `{PREFIX}_URL`（必填）
    /// - `{PREFIX}_USERNAME`、`{PREFIX}_PASSWORD`（默认空）
    /// - `{PREFIX}_TIMEOUT_SECS`（默认 30）
    /// - `{PREFIX}_VERIFY_TLS`（默认 true）
    pub fn from_env(prefix: &str) -> Result<Self> {
        if std::env::var(format!("{}_URL", prefix)).is_err() {
            return Err(Error::Configuration(format!(
                "{}_URL environment variable is required",
                prefix
            )));
        }
        let config = Self::default().with_env(prefix);
        config.base_url()?;
        Ok(config)
    }

    /// 用已设置的 `{PREFIX}_*` 环境变量覆盖对应字段，未设置的保持不变
    pub fn with_env(mut self, prefix: &str) -> Self {
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();

        if let Some(server_url) = var("URL") {
            self.server_url = server_url;
        }
        if let Some(username) = var("USERNAME") {
            self.username = username;
        }
        if let Some(password) = var("PASSWORD") {
            self.password = password;
        }
        if let Some(timeout) = var("TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.timeout = timeout;
        }
        if let Some(verify_tls) = var("VERIFY_TLS") {
            self.verify_tls = !matches!(verify_tls.as_str(), "0" | "false" | "no");
        }
        self
    }

    /// 解析后的服务器 URL
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.server_url)
            .map_err(|e| Error::Configuration(format!("invalid server URL {}: {}", self.server_url, e)))
    }
}
