//! LCP 许可证状态服务器客户端
//!
//! 注册、归还、续借接口的查询参数直接拼接在路径后面，设备 id 与名称
//! 按表单规则编码。

use chrono::{DateTime, FixedOffset};
use reqwest::{Method, StatusCode};
use serde_json::json;
use tracing::{debug, info};
use url::form_urlencoded::byte_serialize;

use crate::config::ClientConfig;
use crate::datetime::w3c;
use crate::error::{Error, Result, TransportError};
use crate::http::{encode, failure_message, HttpClient};
use crate::status::HttpStatus;
use crate::types::{Device, License, LicenseState, LicenseStatus, RegisteredDevices};

/// 许可证状态服务器客户端
#[derive(Debug, Clone)]
pub struct LicenseStatusClient {
    http: HttpClient,
}

impl LicenseStatusClient {
    /// 创建新的客户端实例
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(&config)?,
        })
    }

    /// 从 `LSD_*` 环境变量创建客户端
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env("LSD")?)
    }

    /// 通知状态服务器有新许可证生成
    ///
    /// 服务器返回 201 时为 true。
    pub async fn notify_new_license(&self, license: &License) -> Result<bool> {
        info!("Notifying new license: {:?}", license.id);

        let result = match encode(license) {
            Ok(body) => self.http.execute(Method::PUT, "/licenses", None, Some(body)).await,
            Err(e) => Err(e),
        };

        result
            .map(|status| status == StatusCode::CREATED)
            .map_err(|e| {
                let message = failure_message(&e);
                match e.status() {
                    Some(HttpStatus::Unauthorized) => unauthorized(message, e),
                    Some(HttpStatus::BadRequest) => bad_request(message, e),
                    _ => server_error(message, e),
                }
            })
    }

    /// 获取许可证状态文档
    pub async fn license_status(&self, license_id: &str) -> Result<LicenseStatus> {
        info!("Fetching status of license: {}", license_id);

        let path = format!("/licenses/{}/status", license_id);
        self.http
            .fetch(Method::GET, &path, None, None)
            .await
            .map_err(|e| {
                let message = failure_message(&e);
                match e.status() {
                    Some(HttpStatus::Unauthorized) => unauthorized(message, e),
                    Some(HttpStatus::NotFound) => license_not_found(license_id, message, e),
                    _ => server_error(message, e),
                }
            })
    }

    /// 为许可证注册设备
    pub async fn license_register_device(&self, license_id: &str, device: &Device) -> Result<LicenseStatus> {
        info!("Registering device {} for license {}", device.device_id(), license_id);

        let path = format!("/licenses/{}/register", license_id);
        let query = device_query(device);
        self.http
            .fetch(Method::POST, &path, Some(&query), None)
            .await
            .map_err(|e| {
                let message = failure_message(&e);
                match e.status() {
                    Some(HttpStatus::BadRequest) => Error::DeviceRegistrationBadRequest {
                        license_id: license_id.to_string(),
                        device: device.clone(),
                        message: lending_message(&e, message, || {
                            format!(
                                "Your device {} could not be registered properly for license {}.",
                                device.device_id(),
                                license_id
                            )
                        }),
                        source: Some(e),
                    },
                    Some(HttpStatus::NotFound) => license_not_found(license_id, message, e),
                    _ => server_error(message, e),
                }
            })
    }

    /// 归还借阅
    pub async fn lending_return(&self, license_id: &str, device: &Device) -> Result<LicenseStatus> {
        info!("Returning license {} from device {}", license_id, device.device_id());

        let path = format!("/licenses/{}/return", license_id);
        let query = device_query(device);
        self.http
            .fetch(Method::PUT, &path, Some(&query), None)
            .await
            .map_err(|e| {
                let message = failure_message(&e);
                match e.status() {
                    Some(HttpStatus::BadRequest) => Error::LendingReturnBadRequest {
                        license_id: license_id.to_string(),
                        device: device.clone(),
                        message: lending_message(&e, message, || {
                            format!(
                                "Your publication {} could not be returned properly from {}.",
                                license_id,
                                device.device_id()
                            )
                        }),
                        source: Some(e),
                    },
                    Some(HttpStatus::Forbidden) => Error::LendingReturnForbidden {
                        license_id: license_id.to_string(),
                        device: device.clone(),
                        message: lending_message(&e, message, || {
                            format!(
                                "Your publication {} cannot be returned from device {}.",
                                license_id,
                                device.device_id()
                            )
                        }),
                        source: Some(e),
                    },
                    Some(HttpStatus::NotFound) => license_not_found(license_id, message, e),
                    _ => server_error(message, e),
                }
            })
    }

    /// 续借
    ///
    /// 设备与新的到期时间都为空时不带查询参数，由服务器使用默认续借期。
    pub async fn lending_renewal(
        &self,
        license_id: &str,
        device: Option<&Device>,
        new_end_date: Option<DateTime<FixedOffset>>,
    ) -> Result<LicenseStatus> {
        info!("Renewing license: {}", license_id);

        let path = format!("/licenses/{}/renew", license_id);
        let query = renewal_query(device, new_end_date.as_ref());
        self.http
            .fetch(Method::PUT, &path, Some(&query), None)
            .await
            .map_err(|e| {
                let message = failure_message(&e);
                let device_id = device.map(Device::device_id).unwrap_or("unknown device");
                match e.status() {
                    Some(HttpStatus::BadRequest) => Error::LendingRenewalBadRequest {
                        license_id: license_id.to_string(),
                        device: device.cloned(),
                        message: lending_message(&e, message, || {
                            format!(
                                "Your publication {} could not be renewed properly from {}.",
                                license_id, device_id
                            )
                        }),
                        source: Some(e),
                    },
                    Some(HttpStatus::Forbidden) => Error::LendingRenewalForbidden {
                        license_id: license_id.to_string(),
                        device: device.cloned(),
                        message: lending_message(&e, message, || {
                            format!(
                                "Incorrect renewal period, your publication {} could not be renewed for device {}.",
                                license_id, device_id
                            )
                        }),
                        source: Some(e),
                    },
                    Some(HttpStatus::NotFound) => license_not_found(license_id, message, e),
                    _ => server_error(message, e),
                }
            })
    }

    /// 取消借阅
    ///
    /// `message` 为空时使用包含许可证 id 的默认说明。
    pub async fn lending_cancel(&self, license_id: &str, message: Option<&str>) -> Result<bool> {
        info!("Cancelling license: {}", license_id);

        let result = self
            .change_status(license_id, LicenseState::Cancelled, &cancel_message(license_id, message))
            .await;

        result.map_err(|e| {
            let message = failure_message(&e);
            match e.status() {
                Some(HttpStatus::BadRequest) => Error::LendingCancelBadRequest {
                    license_id: license_id.to_string(),
                    message: lending_message(&e, message, || {
                        format!("Your publication {} could not be cancelled properly.", license_id)
                    }),
                    source: Some(e),
                },
                Some(HttpStatus::Forbidden) => Error::LendingCancelUnauthorized {
                    license_id: license_id.to_string(),
                    message: lending_message(&e, message, || {
                        format!("Not allowed to cancel your publication {}.", license_id)
                    }),
                    source: Some(e),
                },
                Some(HttpStatus::NotFound) => license_not_found(license_id, message, e),
                _ => server_error(message, e),
            }
        })
    }

    /// 撤销借阅
    ///
    /// `message` 为空时使用包含许可证 id 的默认说明。
    pub async fn lending_revoke(&self, license_id: &str, message: Option<&str>) -> Result<bool> {
        info!("Revoking license: {}", license_id);

        let result = self
            .change_status(license_id, LicenseState::Revoked, &revoke_message(license_id, message))
            .await;

        result.map_err(|e| {
            let message = failure_message(&e);
            match e.status() {
                Some(HttpStatus::BadRequest) => Error::LendingRevokeBadRequest {
                    license_id: license_id.to_string(),
                    message: lending_message(&e, message, || {
                        format!("Your publication {} could not be revoked properly.", license_id)
                    }),
                    source: Some(e),
                },
                Some(HttpStatus::Forbidden) => Error::LendingRevokeUnauthorized {
                    license_id: license_id.to_string(),
                    message: lending_message(&e, message, || {
                        format!("Not allowed to revoke your publication {}.", license_id)
                    }),
                    source: Some(e),
                },
                Some(HttpStatus::NotFound) => license_not_found(license_id, message, e),
                _ => server_error(message, e),
            }
        })
    }

    /// 分页列出许可证状态
    ///
    /// 三个参数非空时都必须 ≥ 1，否则不发起请求直接返回 `InvalidArgument`。
    pub async fn licenses(
        &self,
        devices: Option<i64>,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> Result<Vec<LicenseStatus>> {
        for (name, value) in [("devices", devices), ("page", page), ("per_page", per_page)] {
            if let Some(value) = value.filter(|v| *v < 1) {
                return Err(Error::InvalidArgument(format!(
                    "{} must be greater than or equal to 1, got {}",
                    name, value
                )));
            }
        }
        info!(
            "Listing license statuses (devices {:?}, page {:?}, per_page {:?})",
            devices, page, per_page
        );

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in [("devices", devices), ("page", page), ("per_page", per_page)] {
            if let Some(value) = value {
                query.append_pair(name, &value.to_string());
            }
        }
        let query = query.finish();

        self.http
            .fetch(Method::GET, "/licenses", Some(&query), None)
            .await
            .map_err(listing_failure)
    }

    /// 列出许可证已注册的设备
    pub async fn list_registered_devices(&self, license_id: &str) -> Result<RegisteredDevices> {
        info!("Listing devices registered for license: {}", license_id);

        let path = format!("/licenses/{}/registered", license_id);
        let devices: RegisteredDevices = self
            .http
            .fetch(Method::GET, &path, None, None)
            .await
            .map_err(listing_failure)?;
        debug!("{} devices registered for {}", devices.devices.len(), license_id);
        Ok(devices)
    }

    async fn change_status(
        &self,
        license_id: &str,
        state: LicenseState,
        message: &str,
    ) -> std::result::Result<bool, TransportError> {
        let path = format!("/licenses/{}/status", license_id);
        let body = encode(&json!({ "status": state, "message": message }))?;
        let status = self.http.execute(Method::PATCH, &path, None, Some(body)).await?;
        Ok(status == StatusCode::OK)
    }
}

fn device_query(device: &Device) -> String {
    format!(
        "id={}&name={}",
        byte_serialize(device.device_id().as_bytes()).collect::<String>(),
        device.name_url_encoded()
    )
}

fn renewal_query(device: Option<&Device>, new_end_date: Option<&DateTime<FixedOffset>>) -> String {
    let mut parts = Vec::new();
    if let Some(device) = device {
        parts.push(device_query(device));
    }
    if let Some(end) = new_end_date {
        let end = w3c::format(end);
        parts.push(format!("end={}", byte_serialize(end.as_bytes()).collect::<String>()));
    }
    parts.join("&")
}

fn cancel_message(license_id: &str, message: Option<&str>) -> String {
    match message {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => format!("The license {} was cancelled by the system.", license_id),
    }
}

fn revoke_message(license_id: &str, message: Option<&str>) -> String {
    match message {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => format!("The license {} was revoked by the system.", license_id),
    }
}

/// 服务器返回空响应体时改用描述性的默认消息
fn lending_message(failure: &TransportError, message: String, default: impl FnOnce() -> String) -> String {
    match failure {
        TransportError::Status { body, .. } if body.trim().is_empty() => default(),
        _ => message,
    }
}

fn server_error(message: String, failure: TransportError) -> Error {
    Error::LicenseStatusServer {
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

fn unauthorized(message: String, failure: TransportError) -> Error {
    Error::Unauthorized {
        message,
        source: Some(failure),
    }
}

fn license_not_found(license_id: &str, message: String, failure: TransportError) -> Error {
    Error::LicenseNotFound {
        license_id: license_id.to_string(),
        message,
        source: Some(failure),
    }
}

/// 列表类接口：401 未认证，400 请求错误
fn listing_failure(failure: TransportError) -> Error {
    let message = failure_message(&failure);
    match failure.status() {
        Some(HttpStatus::Unauthorized) => unauthorized(message, failure),
        Some(HttpStatus::BadRequest) => bad_request(message, failure),
        _ => server_error(message, failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn device() -> Device {
        Device::new("1d3a5f6e-0001", "SNE-LX1 27 HUAWEI/SNE-LX1:8.1.0").unwrap()
    }

    #[test]
    fn test_device_query_encodes_id_and_name() {
        let device = Device::new("a b&c", "My Reader").unwrap();
        assert_eq!(device_query(&device), "id=a+b%26c&name=My+Reader");
    }

    #[test]
    fn test_renewal_query_variants() {
        let end = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap();

        assert_eq!(renewal_query(None, None), "");
        assert_eq!(renewal_query(None, Some(&end)), "end=2024-06-01T12%3A00%3A00%2B02%3A00");
        assert_eq!(
            renewal_query(Some(&device()), Some(&end)),
            "id=1d3a5f6e-0001&name=SNE-LX1+27+HUAWEI%2FSNE-LX1%3A8.1.0&end=2024-06-01T12%3A00%3A00%2B02%3A00"
        );
    }

    #[test]
    fn test_default_lending_messages() {
        assert!(cancel_message("L1", None).contains("L1"));
        assert!(cancel_message("L1", Some("")).contains("L1"));
        assert_eq!(cancel_message("L1", Some("user request")), "user request");
        assert!(revoke_message("L2", None).contains("L2"));
        assert_eq!(revoke_message("L2", Some("fraud")), "fraud");
        assert_ne!(cancel_message("L1", None), revoke_message("L1", None));
    }

    #[test]
    fn test_lending_message_falls_back_on_empty_body() {
        let failure = |body: &str| TransportError::Status {
            status: 400,
            url: "http://lsd.test/licenses/L1/status".to_string(),
            body: body.to_string(),
        };
        let fallback = || "fallback".to_string();

        assert_eq!(lending_message(&failure(""), "HTTP 400".to_string(), fallback), "fallback");
        assert_eq!(lending_message(&failure("  \n"), "HTTP 400".to_string(), fallback), "fallback");
        assert_eq!(lending_message(&failure("rejected"), "kept".to_string(), fallback), "kept");
    }

    #[test]
    fn test_listing_failure_mapping() {
        let status = |code| TransportError::Status {
            status: code,
            url: "http://lsd.test/licenses".to_string(),
            body: String::new(),
        };
        assert!(matches!(listing_failure(status(401)), Error::Unauthorized { .. }));
        assert!(matches!(listing_failure(status(400)), Error::BadRequest { .. }));
        assert!(matches!(listing_failure(status(404)), Error::LicenseStatusServer { .. }));
    }
}
