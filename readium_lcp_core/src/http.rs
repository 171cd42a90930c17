//! HTTP 传输
//!
//! 两个客户端共用的请求发送、JSON 解析与响应体落盘逻辑。
//! 非 2xx 响应统一转换为 `TransportError::Status`，由各客户端按
//! 状态码映射到业务错误。

use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result, TransportError};

/// 带默认头的 HTTP 客户端
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    http: Client,
    base_url: Url,
}

impl HttpClient {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "server URL {} cannot be used as a base URL",
                config.server_url
            )));
        }

        let token = BASE64.encode(format!("{}:{}", config.username, config.password));
        let mut authorization = HeaderValue::from_str(&format!("Basic {}", token))
            .map_err(|e| Error::Configuration(format!("invalid credentials: {}", e)))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, authorization);

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .danger_accept_invalid_certs(!config.verify_tls)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    /// 拼接接口地址，保留服务器 URL 自带的路径前缀
    pub(crate) fn endpoint(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        let full_path = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&full_path);
        url.set_query(query.filter(|q| !q.is_empty()));
        url
    }

    /// 发送请求，非 2xx 状态返回 `TransportError::Status`
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<String>,
    ) -> std::result::Result<Response, TransportError> {
        let url = self.endpoint(path, query);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, url.clone());
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        Ok(response)
    }

    /// 发送请求并把响应体解析为 JSON 文档
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<String>,
    ) -> std::result::Result<T, TransportError> {
        let response = self.send(method, path, query, body).await?;
        let url = response.url().to_string();
        let bytes = response.bytes().await.map_err(|source| TransportError::Request {
            url: url.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| TransportError::Decode { url, source })
    }

    /// 发送请求，只关心状态码
    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<String>,
    ) -> std::result::Result<StatusCode, TransportError> {
        Ok(self.send(method, path, query, body).await?.status())
    }

    /// 发送请求并把响应体逐块写入文件
    pub(crate) async fn download(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        save_as: &Path,
    ) -> std::result::Result<StatusCode, TransportError> {
        let mut response = self.send(method, path, None, body).await?;
        let status = response.status();
        let url = response.url().to_string();

        let io_error = |source| TransportError::Io {
            path: save_as.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(save_as).await.map_err(io_error)?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await.map_err(|source| TransportError::Request {
            url: url.clone(),
            source,
        })? {
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len();
        }
        file.flush().await.map_err(io_error)?;

        debug!("Saved {} bytes from {} to {}", written, url, save_as.display());
        Ok(status)
    }
}

/// 编码 JSON 请求体
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> std::result::Result<String, TransportError> {
    serde_json::to_string(value).map_err(TransportError::Encode)
}

/// 记录失败并返回错误消息
pub(crate) fn failure_message(failure: &TransportError) -> String {
    let message = failure.to_string();
    error!("{}", message);
    message
}
