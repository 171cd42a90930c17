//! Readium LCP 客户端核心库
//!
//! 提供访问 LCP 许可证服务器与许可证状态服务器（LSD）的异步客户端，包括：
//! - 加密内容登记与下载
//! - 许可证生成、获取与更新
//! - 设备注册与借阅生命周期（归还、续借、取消、撤销）

pub mod config;
pub mod content;
pub mod datetime;
pub mod error;
mod http;
pub mod license_server;
pub mod license_status;
pub mod params;
pub mod status;
pub mod types;

pub use config::ClientConfig;
pub use content::ProtectedContent;
pub use error::{Error, ErrorKind, Result, TransportError};
pub use license_server::LicenseServerClient;
pub use license_status::LicenseStatusClient;
pub use params::ParameterBag;
pub use status::HttpStatus;
pub use types::*;
