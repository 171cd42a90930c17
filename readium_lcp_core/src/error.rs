//! 错误类型定义
//!
//! 每个客户端操作在失败时只返回一种错误。HTTP 失败按状态码分类
//! （见各客户端的映射表），未识别的状态码以及没有状态码的传输失败
//! 一律归入对应客户端的服务端错误。

use std::path::PathBuf;

use thiserror::Error;

use crate::content::ProtectedContent;
use crate::status::HttpStatus;
use crate::types::{Device, PartialLicense};

/// 传输层失败，作为业务错误的 source 保留
#[derive(Debug, Error)]
pub enum TransportError {
    /// 服务端返回了非 2xx 状态
    #[error("HTTP {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    /// 连接、超时、TLS 等失败
    #[error("Failed to connect to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 请求体编码失败
    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// 响应体解析失败
    #[error("Failed to parse response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// 响应体写入文件失败
    #[error("Failed to write response body to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// 失败携带的 HTTP 状态码（仅 `Status` 有）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// 已识别的状态码
    pub fn status(&self) -> Option<HttpStatus> {
        self.status_code().and_then(HttpStatus::from_code)
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalServerError,
    InvalidArgument,
    Configuration,
}

impl ErrorKind {
    /// 类别对应的 HTTP 状态码，本地错误没有
    pub fn status(self) -> Option<HttpStatus> {
        match self {
            Self::BadRequest => Some(HttpStatus::BadRequest),
            Self::Unauthorized => Some(HttpStatus::Unauthorized),
            Self::Forbidden => Some(HttpStatus::Forbidden),
            Self::NotFound => Some(HttpStatus::NotFound),
            Self::InternalServerError => Some(HttpStatus::InternalServerError),
            Self::InvalidArgument | Self::Configuration => None,
        }
    }
}

/// 错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 请求格式错误
    #[error("{message}")]
    BadRequest {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 提交加密内容时请求被拒绝
    #[error("{message}")]
    ContentBadRequest {
        content: Box<ProtectedContent>,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 内容不存在（归入 BadRequest 类别）
    #[error("{message}")]
    ContentNotFound {
        content_id: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 存储加密内容时目标不存在（归入 BadRequest 类别）
    #[error("{message}")]
    StoreContentNotFound {
        content: Box<ProtectedContent>,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 生成许可证时内容不存在（由 404 触发，归入 BadRequest 类别）
    #[error("{message}")]
    GenerateLicenseNotFound {
        content_id: String,
        partial_license: Box<PartialLicense>,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("{message}")]
    DeviceRegistrationBadRequest {
        license_id: String,
        device: Device,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("{message}")]
    LendingReturnBadRequest {
        license_id: String,
        device: Device,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("{message}")]
    LendingRenewalBadRequest {
        license_id: String,
        device: Option<Device>,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("{message}")]
    LendingCancelBadRequest {
        license_id: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("{message}")]
    LendingRevokeBadRequest {
        license_id: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 用户名或密码不匹配
    #[error("{message}")]
    Unauthorized {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 凭据有效但请求被拒绝
    #[error("{message}")]
    Forbidden {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("{message}")]
    LendingReturnForbidden {
        license_id: String,
        device: Device,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("{message}")]
    LendingRenewalForbidden {
        license_id: String,
        device: Option<Device>,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 取消借阅被拒绝（由 403 触发，归入 Forbidden 类别）
    #[error("{message}")]
    LendingCancelUnauthorized {
        license_id: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 撤销借阅被拒绝（由 403 触发，归入 Forbidden 类别）
    #[error("{message}")]
    LendingRevokeUnauthorized {
        license_id: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 资源不存在
    #[error("{message}")]
    NotFound {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 许可证不存在
    #[error("{message}")]
    LicenseNotFound {
        license_id: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 许可证服务器错误
    #[error("{message}")]
    LicenseServer {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 许可证状态服务器错误
    #[error("{message}")]
    LicenseStatusServer {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// 参数错误（本地校验，不发起请求）
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// 错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest { .. }
            | Self::ContentBadRequest { .. }
            | Self::ContentNotFound { .. }
            | Self::StoreContentNotFound { .. }
            | Self::GenerateLicenseNotFound { .. }
            | Self::DeviceRegistrationBadRequest { .. }
            | Self::LendingReturnBadRequest { .. }
            | Self::LendingRenewalBadRequest { .. }
            | Self::LendingCancelBadRequest { .. }
            | Self::LendingRevokeBadRequest { .. } => ErrorKind::BadRequest,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Forbidden { .. }
            | Self::LendingReturnForbidden { .. }
            | Self::LendingRenewalForbidden { .. }
            | Self::LendingCancelUnauthorized { .. }
            | Self::LendingRevokeUnauthorized { .. } => ErrorKind::Forbidden,
            Self::NotFound { .. } | Self::LicenseNotFound { .. } => ErrorKind::NotFound,
            Self::LicenseServer { .. } | Self::LicenseStatusServer { .. } => ErrorKind::InternalServerError,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// 类别对应的 HTTP 状态码
    pub fn status(&self) -> Option<HttpStatus> {
        self.kind().status()
    }

    /// 触发该错误的传输层失败
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::BadRequest { source, .. }
            | Self::ContentBadRequest { source, .. }
            | Self::ContentNotFound { source, .. }
            | Self::StoreContentNotFound { source, .. }
            | Self::GenerateLicenseNotFound { source, .. }
            | Self::DeviceRegistrationBadRequest { source, .. }
            | Self::LendingReturnBadRequest { source, .. }
            | Self::LendingRenewalBadRequest { source, .. }
            | Self::LendingCancelBadRequest { source, .. }
            | Self::LendingRevokeBadRequest { source, .. }
            | Self::Unauthorized { source, .. }
            | Self::Forbidden { source, .. }
            | Self::LendingReturnForbidden { source, .. }
            | Self::LendingRenewalForbidden { source, .. }
            | Self::LendingCancelUnauthorized { source, .. }
            | Self::LendingRevokeUnauthorized { source, .. }
            | Self::NotFound { source, .. }
            | Self::LicenseNotFound { source, .. }
            | Self::LicenseServer { source, .. }
            | Self::LicenseStatusServer { source, .. } => source.as_ref(),
            Self::InvalidArgument(_) | Self::Configuration(_) => None,
        }
    }

    pub fn license_id(&self) -> Option<&str> {
        match self {
            Self::DeviceRegistrationBadRequest { license_id, .. }
            | Self::LendingReturnBadRequest { license_id, .. }
            | Self::LendingRenewalBadRequest { license_id, .. }
            | Self::LendingCancelBadRequest { license_id, .. }
            | Self::LendingRevokeBadRequest { license_id, .. }
            | Self::LendingReturnForbidden { license_id, .. }
            | Self::LendingRenewalForbidden { license_id, .. }
            | Self::LendingCancelUnauthorized { license_id, .. }
            | Self::LendingRevokeUnauthorized { license_id, .. }
            | Self::LicenseNotFound { license_id, .. } => Some(license_id.as_str()),
            _ => None,
        }
    }

    pub fn content_id(&self) -> Option<&str> {
        match self {
            Self::ContentNotFound { content_id, .. } | Self::GenerateLicenseNotFound { content_id, .. } => {
                Some(content_id.as_str())
            }
            Self::ContentBadRequest { content, .. } | Self::StoreContentNotFound { content, .. } => {
                Some(content.id())
            }
            _ => None,
        }
    }

    pub fn device(&self) -> Option<&Device> {
        match self {
            Self::DeviceRegistrationBadRequest { device, .. }
            | Self::LendingReturnBadRequest { device, .. }
            | Self::LendingReturnForbidden { device, .. } => Some(device),
            Self::LendingRenewalBadRequest { device, .. } | Self::LendingRenewalForbidden { device, .. } => {
                device.as_ref()
            }
            _ => None,
        }
    }

    pub fn partial_license(&self) -> Option<&PartialLicense> {
        match self {
            Self::GenerateLicenseNotFound { partial_license, .. } => Some(&**partial_license),
            _ => None,
        }
    }

    pub fn protected_content(&self) -> Option<&ProtectedContent> {
        match self {
            Self::ContentBadRequest { content, .. } | Self::StoreContentNotFound { content, .. } => Some(&**content),
            _ => None,
        }
    }
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;
