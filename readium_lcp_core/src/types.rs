//! 数据类型定义
//!
//! LCP 许可证服务器与许可证状态服务器交换的 JSON 文档。

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::datetime::{iso8601, w3c};
use crate::error::{Error, Result};
use crate::params::ParameterBag;

/// 用户信息
///
/// 反序列化同样经过 `User::new` 与 `with_encrypted` 的校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUser")]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    email: String,
    encrypted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "ParameterBag::is_empty")]
    attributes: ParameterBag,
}

#[derive(Deserialize)]
struct RawUser {
    #[serde(default)]
    id: Option<String>,
    email: String,
    #[serde(default = "User::default_encrypted")]
    encrypted: Vec<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    attributes: ParameterBag,
}

impl TryFrom<RawUser> for User {
    type Error = Error;

    fn try_from(raw: RawUser) -> Result<Self> {
        let mut user = User::new(raw.email)?.with_encrypted(raw.encrypted)?;
        user.id = raw.id;
        user.name = raw.name;
        user.attributes = raw.attributes;
        Ok(user)
    }
}

impl User {
    /// 默认加密字段
    pub const DEFAULT_ENCRYPTED: [&'static str; 1] = ["email"];
    /// 允许加密的字段
    pub const VALID_ENCRYPTED: [&'static str; 2] = ["email", "name"];

    /// 创建用户，加密字段默认为 `email`
    pub fn new(email: impl Into<String>) -> Result<Self> {
        let email = email.into();
        if email.is_empty() {
            return Err(Error::InvalidArgument("user email is mandatory".to_string()));
        }

        Ok(Self {
            id: None,
            email,
            encrypted: Self::default_encrypted(),
            name: None,
            attributes: ParameterBag::new(),
        })
    }

    /// 指定加密字段，只允许 `email` 和 `name`
    pub fn with_encrypted<I, S>(mut self, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if let Some(invalid) = fields.iter().find(|f| !Self::VALID_ENCRYPTED.contains(&f.as_str())) {
            return Err(Error::InvalidArgument(format!(
                "the value {} is not a valid encrypted field",
                invalid
            )));
        }
        self.encrypted = fields;
        Ok(self)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attributes(mut self, attributes: ParameterBag) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn encrypted(&self) -> &[String] {
        &self.encrypted
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn attributes(&self) -> &ParameterBag {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut ParameterBag {
        &mut self.attributes
    }

    fn default_encrypted() -> Vec<String> {
        Self::DEFAULT_ENCRYPTED.iter().map(|s| s.to_string()).collect()
    }
}

/// 阅读设备
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDevice")]
pub struct Device {
    #[serde(rename = "id")]
    device_id: String,
    #[serde(rename = "name")]
    device_name: String,
    /// 注册时间，由服务端设置
    #[serde(rename = "timestamp", with = "iso8601::option", skip_serializing_if = "Option::is_none")]
    registration: Option<DateTime<FixedOffset>>,
}

#[derive(Deserialize)]
struct RawDevice {
    id: String,
    name: String,
    #[serde(default, with = "iso8601::option")]
    timestamp: Option<DateTime<FixedOffset>>,
}

impl TryFrom<RawDevice> for Device {
    type Error = Error;

    fn try_from(raw: RawDevice) -> Result<Self> {
        let mut device = Device::new(raw.id, raw.name)?;
        device.registration = raw.timestamp;
        Ok(device)
    }
}

impl Device {
    /// 设备 ID 与名称的最大字节数
    pub const MAX_LEN: usize = 255;

    pub fn new(device_id: impl Into<String>, device_name: impl Into<String>) -> Result<Self> {
        let device_id = device_id.into();
        let device_name = device_name.into();

        if device_id.is_empty() || device_id.len() > Self::MAX_LEN {
            return Err(Error::InvalidArgument(
                "device id is mandatory and its maximum length is 255 bytes".to_string(),
            ));
        }
        if device_name.is_empty() || device_name.len() > Self::MAX_LEN {
            return Err(Error::InvalidArgument(
                "device name is mandatory and its maximum length is 255 bytes".to_string(),
            ));
        }

        Ok(Self {
            device_id,
            device_name,
            registration: None,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// URL 编码后的设备名（表单编码，空格为 `+`）
    pub fn name_url_encoded(&self) -> String {
        url::form_urlencoded::byte_serialize(self.device_name.as_bytes()).collect()
    }

    pub fn registration(&self) -> Option<&DateTime<FixedOffset>> {
        self.registration.as_ref()
    }
}

/// 用户密钥
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKey {
    pub text_hint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hex_value: String,
    #[serde(default = "UserKey::default_algorithm")]
    pub algorithm: String,
    /// 服务端生成的密钥校验值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_check: Option<String>,
}

impl UserKey {
    pub const DEFAULT_ALGORITHM: &'static str = "http://www.w3.org/2001/04/xmlenc#sha256";

    pub fn new(text_hint: impl Into<String>, hex_value: impl Into<String>) -> Self {
        Self {
            text_hint: text_hint.into(),
            hex_value: hex_value.into(),
            algorithm: Self::default_algorithm(),
            key_check: None,
        }
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    fn default_algorithm() -> String {
        Self::DEFAULT_ALGORITHM.to_string()
    }
}

/// 内容密钥
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentKey {
    pub encrypted_value: String,
    #[serde(default = "ContentKey::default_algorithm")]
    pub algorithm: String,
}

impl ContentKey {
    pub const DEFAULT_ALGORITHM: &'static str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";

    pub fn new(encrypted_value: impl Into<String>) -> Self {
        Self {
            encrypted_value: encrypted_value.into(),
            algorithm: Self::default_algorithm(),
        }
    }

    fn default_algorithm() -> String {
        Self::DEFAULT_ALGORITHM.to_string()
    }
}

/// 加密信息
///
/// `profile` 与 `content_key` 在提交部分许可证时通常为空，
/// 由服务端生成许可证后补全。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encryption {
    pub user_key: UserKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_key: Option<ContentKey>,
}

impl Encryption {
    pub fn new(user_key: UserKey) -> Self {
        Self {
            user_key,
            profile: None,
            content_key: None,
        }
    }
}

/// 权限
///
/// 字段为空表示不限制。`start`/`end` 的先后关系由服务端校验。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rights {
    /// 最多可打印页数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print: Option<u32>,
    /// 最多可复制字符数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<u32>,
    #[serde(default, with = "w3c::option", skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<FixedOffset>>,
    #[serde(default, with = "w3c::option", skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "ParameterBag::is_empty")]
    pub attributes: ParameterBag,
}

impl Rights {
    pub fn new(
        print: Option<u32>,
        copy: Option<u32>,
        start: Option<DateTime<FixedOffset>>,
        end: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            print,
            copy,
            start,
            end,
            attributes: ParameterBag::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: ParameterBag) -> Self {
        self.attributes = attributes;
        self
    }
}

/// 许可证签名，仅由服务端生成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub certificate: String,
    pub algorithm: String,
    pub value: String,
}

impl Signature {
    pub const DEFAULT_ALGORITHM: &'static str = "http://www.w3.org/2001/04/xmlenc#sha256";
}

/// 链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templated: Option<bool>,
}

impl Link {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            media_type: None,
            title: None,
            length: None,
            hash: None,
            templated: None,
        }
    }
}

/// 许可证与状态文档的最后更新时间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(with = "iso8601")]
    pub license: DateTime<FixedOffset>,
    #[serde(with = "iso8601")]
    pub status: DateTime<FixedOffset>,
}

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Register,
    Renew,
    Return,
    Revoke,
    Cancel,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Renew => "renew",
            Self::Return => "return",
            Self::Revoke => "revoke",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 借阅事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "id")]
    pub device_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(rename = "name")]
    pub device_name: String,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<FixedOffset>,
}

/// 许可证状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseState {
    Ready,
    Active,
    Revoked,
    Returned,
    Cancelled,
    Expired,
}

impl LicenseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for LicenseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 部分许可证：调用方提交、尚未签名的许可证请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialLicense {
    pub provider: String,
    pub user: User,
    pub encryption: Encryption,
    pub rights: Rights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PartialLicense {
    pub fn new(provider: impl Into<String>, user: User, encryption: Encryption, rights: Rights) -> Self {
        Self {
            provider: provider.into(),
            user,
            encryption,
            rights,
            id: None,
        }
    }
}

/// 许可证：服务端签发后的完整文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub provider: String,
    pub user: User,
    pub encryption: Encryption,
    pub rights: Rights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, with = "w3c::option", skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl License {
    /// 由部分许可证构造，签发信息为空
    pub fn from_partial(partial: PartialLicense) -> Self {
        Self {
            provider: partial.provider,
            user: partial.user,
            encryption: partial.encryption,
            rights: partial.rights,
            id: partial.id,
            issued: None,
            links: Vec::new(),
            signature: None,
        }
    }

    /// 按 `rel` 查找链接
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }
}

impl From<License> for PartialLicense {
    fn from(license: License) -> Self {
        Self {
            provider: license.provider,
            user: license.user,
            encryption: license.encryption,
            rights: license.rights,
            id: license.id,
        }
    }
}

/// 许可证状态文档（LSD），完全由服务端生成
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseStatus {
    pub id: String,
    pub status: LicenseState,
    #[serde(default)]
    pub message: String,
    pub updated: Timestamps,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_rights: Option<Rights>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_count: Option<u32>,
}

impl LicenseStatus {
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }
}

/// 许可证下已注册的设备
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredDevices {
    #[serde(rename = "id")]
    pub license_id: String,
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_rights() -> Rights {
        let start = w3c::parse("2024-05-01T10:00:00+02:00").unwrap();
        let end = w3c::parse("2024-05-02T10:00:00+02:00").unwrap();
        let attributes: ParameterBag = [("https://example.org/lcp/tier", "gold")].into_iter().collect();
        Rights::new(Some(10), Some(1024), Some(start), Some(end)).with_attributes(attributes)
    }

    fn sample_user() -> User {
        User::new("reader@example.org")
            .unwrap()
            .with_encrypted(["email", "name"])
            .unwrap()
            .with_id("d9f298a7-7f34-49e7-8aae-4378ecb1d597")
            .with_name("reader")
            .with_attributes([("https://example.org/lcp/user/language", "es")].into_iter().collect())
    }

    fn sample_license() -> License {
        let mut encryption = Encryption::new(UserKey::new("Enter your email", "4981AA0A50D5"));
        encryption.profile = Some("http://readium.org/lcp/basic-profile".to_string());
        encryption.content_key = Some(ContentKey::new("c2VjcmV0"));

        let mut license = License::from_partial(PartialLicense::new(
            "https://provider.example.org",
            sample_user(),
            encryption,
            sample_rights(),
        ));
        license.id = Some("L1".to_string());
        license.issued = Some(w3c::parse("2024-05-01T09:00:00+00:00").unwrap());
        license.links = vec![Link::new("hint", "https://provider.example.org/hint")];
        license.signature = Some(Signature {
            certificate: "MIIC".to_string(),
            algorithm: Signature::DEFAULT_ALGORITHM.to_string(),
            value: "c2ln".to_string(),
        });
        license
    }

    #[test]
    fn test_device_length_bounds() {
        let max = "x".repeat(255);
        let over = "x".repeat(256);

        assert!(Device::new("a", "b").is_ok());
        assert!(Device::new(max.clone(), max.clone()).is_ok());
        assert!(Device::new("", "name").is_err());
        assert!(Device::new("id", "").is_err());
        assert!(Device::new(over.clone(), "name").is_err());
        assert!(Device::new("id", over).is_err());
    }

    #[test]
    fn test_device_length_counts_bytes() {
        // 128 个两字节字符 = 256 字节
        let wide = "é".repeat(128);
        assert!(Device::new("id", wide).is_err());
    }

    #[test]
    fn test_device_name_url_encoded() {
        let device = Device::new("dev-1", "SNE-LX1 27 HUAWEI/SNE-LX1:8.1.0").unwrap();
        assert_eq!(device.name_url_encoded(), "SNE-LX1+27+HUAWEI%2FSNE-LX1%3A8.1.0");
        assert_eq!(device.device_name(), "SNE-LX1 27 HUAWEI/SNE-LX1:8.1.0");
    }

    #[test]
    fn test_user_default_encrypted() {
        let user = User::new("reader@example.org").unwrap();
        assert_eq!(user.encrypted(), ["email".to_string()]);
        assert!(user.id().is_none());
    }

    #[test]
    fn test_user_rejects_unknown_encrypted_field() {
        let result = User::new("reader@example.org").unwrap().with_encrypted(["email", "phone"]);
        assert!(matches!(result, Err(Error::InvalidArgument(msg)) if msg.contains("phone")));
    }

    #[test]
    fn test_user_requires_email() {
        assert!(User::new("").is_err());
    }

    #[test]
    fn test_user_wire_format() {
        let value = serde_json::to_value(sample_user()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "d9f298a7-7f34-49e7-8aae-4378ecb1d597",
                "email": "reader@example.org",
                "encrypted": ["email", "name"],
                "name": "reader",
                "attributes": { "https://example.org/lcp/user/language": "es" }
            })
        );

        let bare = serde_json::to_value(User::new("a@b.c").unwrap()).unwrap();
        assert_eq!(bare, json!({ "email": "a@b.c", "encrypted": ["email"] }));
    }

    #[test]
    fn test_user_round_trip() {
        let user = sample_user();
        let json = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_rights_wire_format_and_round_trip() {
        let rights = sample_rights();
        let value = serde_json::to_value(&rights).unwrap();
        assert_eq!(value["start"], "2024-05-01T10:00:00+02:00");
        assert_eq!(value["end"], "2024-05-02T10:00:00+02:00");
        assert_eq!(value["attributes"]["https://example.org/lcp/tier"], "gold");

        let back: Rights = serde_json::from_value(value).unwrap();
        assert_eq!(back, rights);

        let unlimited = serde_json::to_value(Rights::default()).unwrap();
        assert_eq!(unlimited, json!({}));
    }

    #[test]
    fn test_encryption_wire_names() {
        let mut encryption = Encryption::new(UserKey::new("hint", "ABCD"));
        encryption.content_key = Some(ContentKey::new("key"));
        let value = serde_json::to_value(&encryption).unwrap();
        assert_eq!(
            value,
            json!({
                "user_key": {
                    "text_hint": "hint",
                    "hex_value": "ABCD",
                    "algorithm": UserKey::DEFAULT_ALGORITHM
                },
                "content_key": {
                    "encrypted_value": "key",
                    "algorithm": ContentKey::DEFAULT_ALGORITHM
                }
            })
        );
    }

    #[test]
    fn test_license_round_trip() {
        let license = sample_license();
        let json = serde_json::to_string(&license).unwrap();
        let back: License = serde_json::from_str(&json).unwrap();
        assert_eq!(back, license);
        assert_eq!(back.link("hint").map(|l| l.href.as_str()), Some("https://provider.example.org/hint"));

        let value = serde_json::to_value(&license).unwrap();
        assert_eq!(value["issued"], "2024-05-01T09:00:00+00:00");
    }

    #[test]
    fn test_license_projection_to_partial() {
        let license = sample_license();
        let partial: PartialLicense = license.clone().into();
        assert_eq!(partial.id.as_deref(), Some("L1"));
        assert_eq!(partial.user, license.user);
        let value = serde_json::to_value(&partial).unwrap();
        assert!(value.get("signature").is_none());
    }

    #[test]
    fn test_license_from_server_payload() {
        let raw = json!({
            "id": "0d2f6fe2-1d4f-4b6a-9b11-4a0b7b3f3c4e",
            "issued": "2024-05-01T09:00:00Z",
            "provider": "https://provider.example.org",
            "encryption": {
                "profile": "http://readium.org/lcp/basic-profile",
                "content_key": {
                    "algorithm": "http://www.w3.org/2001/04/xmlenc#aes256-cbc",
                    "encrypted_value": "AbCd"
                },
                "user_key": {
                    "algorithm": "http://www.w3.org/2001/04/xmlenc#sha256",
                    "text_hint": "Enter your email",
                    "key_check": "KeYcHeCk"
                }
            },
            "links": [
                { "rel": "hint", "href": "https://provider.example.org/hint" },
                { "rel": "publication", "href": "https://cdn.example.org/book.epub",
                  "type": "application/epub+zip", "length": 674328, "hash": "abc" },
                { "rel": "status", "href": "https://lsd.example.org/licenses/x/status",
                  "type": "application/vnd.readium.license.status.v1.0+json" }
            ],
            "user": { "id": "u1", "email": "ENCRYPTED", "encrypted": ["email"] },
            "rights": { "print": 10, "copy": 1024, "start": "2024-05-01T09:00:00Z", "end": "2024-05-02T09:00:00Z" },
            "signature": { "certificate": "MIIC", "value": "c2ln", "algorithm": "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256" }
        });

        let license: License = serde_json::from_value(raw).unwrap();
        assert_eq!(license.links.len(), 3);
        assert_eq!(license.encryption.user_key.key_check.as_deref(), Some("KeYcHeCk"));
        assert!(license.encryption.user_key.hex_value.is_empty());
        assert_eq!(license.rights.print, Some(10));
        assert!(license.rights.attributes.is_empty());
        assert_eq!(license.link("publication").and_then(|l| l.length), Some(674328));
        assert!(license.signature.is_some());
    }

    #[test]
    fn test_license_status_round_trip() {
        let raw = json!({
            "id": "L1",
            "status": "active",
            "message": "The license is active",
            "updated": {
                "license": "2024-05-01T09:00:00Z",
                "status": "2024-05-03T09:00:00+0200"
            },
            "links": [
                { "rel": "license", "href": "https://lcp.example.org/licenses/L1", "type": "application/vnd.readium.lcp.license.v1.0+json" },
                { "rel": "register", "href": "https://lsd.example.org/licenses/L1/register{?id,name}", "templated": true }
            ],
            "potential_rights": { "end": "2024-06-01T00:00:00+00:00", "attributes": { "max": 3 } },
            "events": [
                { "id": "dev-1", "type": "register", "name": "Reader", "timestamp": "2024-05-02T09:00:00Z" }
            ],
            "device_count": 1
        });

        let status: LicenseStatus = serde_json::from_value(raw).unwrap();
        assert_eq!(status.status, LicenseState::Active);
        assert_eq!(status.events[0].event_type, EventType::Register);
        assert_eq!(status.device_count, Some(1));
        assert_eq!(status.link("register").and_then(|l| l.templated), Some(true));
        assert_eq!(status.potential_rights.as_ref().unwrap().attributes.len(), 1);

        let json = serde_json::to_string(&status).unwrap();
        let back: LicenseStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_license_state_rejects_unknown_value() {
        let result: std::result::Result<LicenseState, _> = serde_json::from_value(json!("archived"));
        assert!(result.is_err());
        assert_eq!(LicenseState::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_registered_devices_from_server_payload() {
        let raw = json!({
            "id": "L1",
            "devices": [
                { "id": "dev-1", "name": "Reader", "timestamp": "2024-05-02T09:00:00Z" },
                { "id": "dev-2", "name": "Phone" }
            ]
        });
        let registered: RegisteredDevices = serde_json::from_value(raw).unwrap();
        assert_eq!(registered.license_id, "L1");
        assert_eq!(registered.devices.len(), 2);
        assert!(registered.devices[0].registration().is_some());
        assert!(registered.devices[1].registration().is_none());
    }

    #[test]
    fn test_user_decoding_applies_construction_checks() {
        let invalid: std::result::Result<User, _> = serde_json::from_str(r#"{"email":"","encrypted":["phone"]}"#);
        assert!(invalid.is_err());

        let unknown_field: std::result::Result<User, _> =
            serde_json::from_str(r#"{"email":"a@b.c","encrypted":["phone"]}"#);
        let message = unknown_field.unwrap_err().to_string();
        assert!(message.contains("phone"), "{}", message);

        let user: User = serde_json::from_str(r#"{"id":"u1","email":"a@b.c","name":"A"}"#).unwrap();
        assert_eq!(user.encrypted(), ["email"]);
        assert_eq!(user.id(), Some("u1"));
        assert_eq!(user.name(), Some("A"));
    }

    #[test]
    fn test_device_decoding_applies_length_checks() {
        let empty_id: std::result::Result<Device, _> = serde_json::from_value(json!({ "id": "", "name": "Reader" }));
        assert!(empty_id.is_err());

        let long_name: std::result::Result<Device, _> =
            serde_json::from_value(json!({ "id": "dev-1", "name": "n".repeat(300) }));
        assert!(long_name.is_err());

        let device: Device = serde_json::from_value(json!({ "id": "dev-1", "name": "n".repeat(255) })).unwrap();
        assert_eq!(device.device_name().len(), Device::MAX_LEN);
    }
}
