//! LCP 许可证服务器客户端
//!
//! | 方法 | 接口 |
//! |------|------|
//! | `add_encryption_data` | `PUT /contents/{id}` |
//! | `content` | `GET /contents/{id}` |
//! | `generate_license` | `POST /contents/{id}/license` |
//! | `generate_licensed_publication` | `POST /contents/{id}/publication` |
//! | `fetch_license` | `POST /licenses/{id}` |
//! | `fetch_publication` | `POST /licenses/{id}/publication` |
//! | `list_licenses` | `GET /licenses` |
//! | `list_licenses_by_content` | `GET /contents/{id}/licenses` |
//! | `update_license` / `update_license_rights` | `PATCH /licenses/{id}` |

use std::path::Path;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::content::ProtectedContent;
use crate::error::{Error, Result, TransportError};
use crate::http::{encode, failure_message, HttpClient};
use crate::status::HttpStatus;
use crate::types::{Encryption, License, PartialLicense, Rights, User};

/// 获取许可证时提交的请求体
#[derive(Serialize)]
struct LicenseRequest<'a> {
    user: &'a User,
    encryption: &'a Encryption,
}

/// 只更新权限的请求体
#[derive(Serialize)]
struct RightsUpdate<'a> {
    rights: &'a Rights,
}

/// 许可证服务器客户端
#[derive(Debug, Clone)]
pub struct LicenseServerClient {
    http: HttpClient,
}

impl LicenseServerClient {
    /// 创建新的客户端实例
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(&config)?,
        })
    }

    /// 从 `LCP_*` 环境变量创建客户端
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env("LCP")?)
    }

    /// 存储外部加密工具产出的加密数据
    ///
    /// 服务器返回 200 或 201 时为 true。
    pub async fn add_encryption_data(&self, content: &ProtectedContent) -> Result<bool> {
        info!("Storing encryption data for content: {}", content.id());

        let path = format!("/contents/{}", content.id());
        let result = match encode(content) {
            Ok(body) => self.http.execute(Method::PUT, &path, None, Some(body)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(status) => Ok(status == StatusCode::CREATED || status == StatusCode::OK),
            Err(e) => {
                let message = failure_message(&e);
                Err(match e.status() {
                    Some(HttpStatus::BadRequest) => Error::ContentBadRequest {
                        content: Box::new(content.clone()),
                        message,
                        source: Some(e),
                    },
                    Some(HttpStatus::Unauthorized) => Error::Unauthorized {
                        message,
                        source: Some(e),
                    },
                    Some(HttpStatus::NotFound) => Error::StoreContentNotFound {
                        content: Box::new(content.clone()),
                        message,
                        source: Some(e),
                    },
                    _ => server_error(message, e),
                })
            }
        }
    }

    /// 下载加密内容并保存到 `save_as`
    pub async fn content(&self, content_id: &str, save_as: impl AsRef<Path>) -> Result<bool> {
        let save_as = save_as.as_ref();
        info!("Downloading content {} to {}", content_id, save_as.display());

        let path = format!("/contents/{}", content_id);
        match self.http.download(Method::GET, &path, None, save_as).await {
            Ok(status) => Ok(status == StatusCode::OK),
            Err(e) => {
                let message = failure_message(&e);
                Err(match e.status() {
                    Some(HttpStatus::NotFound) => Error::ContentNotFound {
                        content_id: content_id.to_string(),
                        message,
                        source: Some(e),
                    },
                    _ => server_error(message, e),
                })
            }
        }
    }

    /// 为内容生成许可证
    pub async fn generate_license(&self, content_id: &str, partial_license: &PartialLicense) -> Result<License> {
        info!("Generating license for content: {}", content_id);

        let path = format!("/contents/{}/license", content_id);
        let result: std::result::Result<License, TransportError> = match encode(partial_license) {
            Ok(body) => self.http.fetch(Method::POST, &path, None, Some(body)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(license) => {
                debug!("License generated: {:?}", license.id);
                Ok(license)
            }
            Err(e) => {
                let message = failure_message(&e);
                Err(match e.status() {
                    Some(HttpStatus::NotFound) => {
                        generate_not_found(content_id, partial_license, message, e)
                    }
                    _ => server_error(message, e),
                })
            }
        }
    }

    /// 生成带许可证的出版物并保存到 `save_as`
    ///
    /// 服务器返回 201 时为 true。
    pub async fn generate_licensed_publication(
        &self,
        content_id: &str,
        partial_license: &PartialLicense,
        save_as: impl AsRef<Path>,
    ) -> Result<bool> {
        let save_as = save_as.as_ref();
        info!("Generating licensed publication for content: {}", content_id);

        let path = format!("/contents/{}/publication", content_id);
        let result = match encode(partial_license) {
            Ok(body) => self.http.download(Method::POST, &path, Some(body), save_as).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(status) => Ok(status == StatusCode::CREATED),
            Err(e) => {
                let message = failure_message(&e);
                Err(match e.status() {
                    Some(HttpStatus::BadRequest) => bad_request(message, e),
                    Some(HttpStatus::NotFound) => {
                        generate_not_found(content_id, partial_license, message, e)
                    }
                    _ => server_error(message, e),
                })
            }
        }
    }

    /// 获取已有许可证
    pub async fn fetch_license(&self, license_id: &str, user: &User, encryption: &Encryption) -> Result<License> {
        info!("Fetching license: {}", license_id);

        let path = format!("/licenses/{}", license_id);
        let result = match encode(&LicenseRequest { user, encryption }) {
            Ok(body) => self.http.fetch(Method::POST, &path, None, Some(body)).await,
            Err(e) => Err(e),
        };

        result.map_err(|e| license_failure(license_id, e))
    }

    /// 获取带许可证的出版物并保存到 `save_as`
    ///
    /// 服务器返回 201 时为 true。
    pub async fn fetch_publication(
        &self,
        license_id: &str,
        user: &User,
        encryption: &Encryption,
        save_as: impl AsRef<Path>,
    ) -> Result<bool> {
        let save_as = save_as.as_ref();
        info!("Fetching licensed publication: {}", license_id);

        let path = format!("/licenses/{}/publication", license_id);
        let result = match encode(&LicenseRequest { user, encryption }) {
            Ok(body) => self.http.download(Method::POST, &path, Some(body), save_as).await,
            Err(e) => Err(e),
        };

        result
            .map(|status| status == StatusCode::CREATED)
            .map_err(|e| license_failure(license_id, e))
    }

    /// 分页列出许可证
    ///
    /// 分页参数不在本地校验，非法值由服务器以 400 拒绝。
    pub async fn list_licenses(&self, page: Option<i64>, per_page: Option<i64>) -> Result<Vec<PartialLicense>> {
        info!("Listing licenses (page {:?}, per_page {:?})", page, per_page);

        let query = pagination_query(page, per_page);
        self.http
            .fetch(Method::GET, "/licenses", Some(&query), None)
            .await
            .map_err(|e| {
                let message = failure_message(&e);
                match e.status() {
                    Some(HttpStatus::BadRequest) => bad_request(message, e),
                    _ => server_error(message, e),
                }
            })
    }

    /// 分页列出某内容下的许可证
    pub async fn list_licenses_by_content(
        &self,
        content_id: &str,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> Result<Vec<License>> {
        info!("Listing licenses for content: {}", content_id);

        let path = format!("/contents/{}/licenses", content_id);
        let query = pagination_query(page, per_page);
        self.http
            .fetch(Method::GET, &path, Some(&query), None)
            .await
            .map_err(|e| {
                let message = failure_message(&e);
                match e.status() {
                    Some(HttpStatus::BadRequest) => bad_request(message, e),
                    Some(HttpStatus::NotFound) => Error::ContentNotFound {
                        content_id: content_id.to_string(),
                        message,
                        source: Some(e),
                    },
                    _ => server_error(message, e),
                }
            })
    }

    /// 更新许可证
    ///
    /// 许可证必须带有 id，否则不发起请求。
    pub async fn update_license(&self, license: &License) -> Result<bool> {
        let license_id = match license.id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(Error::InvalidArgument(
                    "the license to update has no identifier".to_string(),
                ))
            }
        };
        info!("Updating license: {}", license_id);

        let path = format!("/licenses/{}", license_id);
        let result = match encode(license) {
            Ok(body) => self.http.execute(Method::PATCH, &path, None, Some(body)).await,
            Err(e) => Err(e),
        };

        result
            .map(|status| status == StatusCode::OK)
            .map_err(|e| update_failure(license_id, e))
    }

    /// 只更新许可证权限
    pub async fn update_license_rights(&self, license_id: &str, rights: &Rights) -> Result<bool> {
        info!("Updating rights of license: {}", license_id);

        let path = format!("/licenses/{}", license_id);
        let result = match encode(&RightsUpdate { rights }) {
            Ok(body) => self.http.execute(Method::PATCH, &path, None, Some(body)).await,
            Err(e) => Err(e),
        };

        result
            .map(|status| status == StatusCode::OK)
            .map_err(|e| update_failure(license_id, e))
    }
}

fn pagination_query(page: Option<i64>, per_page: Option<i64>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if let Some(page) = page {
        query.append_pair("page", &page.to_string());
    }
    if let Some(per_page) = per_page {
        query.append_pair("per_page", &per_page.to_string());
    }
    query.finish()
}

fn server_error(message: String, failure: TransportError) -> Error {
    Error::LicenseServer {
        message,
        source: Some(failure),
    }
}

fn bad_request(message: String, failure: TransportError) -> Error {
    Error::BadRequest {
        message,
        source: Some(failure),
    }
}

fn generate_not_found(
    content_id: &str,
    partial_license: &PartialLicense,
    message: String,
    failure: TransportError,
) -> Error {
    Error::GenerateLicenseNotFound {
        content_id: content_id.to_string(),
        partial_license: Box::new(partial_license.clone()),
        message,
        source: Some(failure),
    }
}

/// 404 映射为许可证不存在，其余为服务器错误
fn license_failure(license_id: &str, failure: TransportError) -> Error {
    let message = failure_message(&failure);
    match failure.status() {
        Some(HttpStatus::NotFound) => Error::LicenseNotFound {
            license_id: license_id.to_string(),
            message,
            source: Some(failure),
        },
        _ => server_error(message, failure),
    }
}

/// 更新类操作：400 请求错误，404 许可证不存在
fn update_failure(license_id: &str, failure: TransportError) -> Error {
    match failure.status() {
        Some(HttpStatus::BadRequest) => {
            let message = failure_message(&failure);
            bad_request(message, failure)
        }
        _ => license_failure(license_id, failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_query() {
        assert_eq!(pagination_query(None, None), "");
        assert_eq!(pagination_query(Some(2), None), "page=2");
        assert_eq!(pagination_query(None, Some(30)), "per_page=30");
        assert_eq!(pagination_query(Some(-1), Some(0)), "page=-1&per_page=0");
    }

    #[test]
    fn test_license_request_body_shape() {
        let user = User::new("reader@example.org").unwrap();
        let encryption = Encryption::new(crate::types::UserKey::new("hint", "ABCD"));
        let body = encode(&LicenseRequest {
            user: &user,
            encryption: &encryption,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["user"]["email"], "reader@example.org");
        assert_eq!(value["encryption"]["user_key"]["text_hint"], "hint");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_unmapped_status_is_server_error() {
        let failure = TransportError::Status {
            status: 409,
            url: "http://lcp.test/licenses/L1".to_string(),
            body: String::new(),
        };
        let err = update_failure("L1", failure);
        assert!(matches!(err, Error::LicenseServer { .. }));
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = LicenseServerClient::new(ClientConfig::new("http://localhost:8989", "admin", "admin"));
        assert!(client.is_ok());
    }
}
