//! 受保护内容
//!
//! 外部加密工具（如 lcpencrypt）产出的加密文件描述。构造时校验
//! 文件确实存在，且长度与 SHA-256 摘要和记录一致，避免向服务器
//! 提交与磁盘内容不符的元数据。

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// 受保护内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedContent {
    #[serde(rename = "content-id")]
    id: String,
    #[serde(rename = "content-encryption-key")]
    encryption_key: String,
    #[serde(rename = "protected-content-location")]
    location: PathBuf,
    #[serde(rename = "protected-content-disposition")]
    file_name: String,
    #[serde(rename = "protected-content-length")]
    length: u64,
    #[serde(rename = "protected-content-sha256")]
    hash: String,
}

impl ProtectedContent {
    pub fn new(
        id: impl Into<String>,
        encryption_key: impl Into<String>,
        location: impl Into<PathBuf>,
        file_name: impl Into<String>,
        length: u64,
        hash: impl Into<String>,
    ) -> Result<Self> {
        let id = id.into();
        let encryption_key = encryption_key.into();
        let location = location.into();
        let file_name = file_name.into();
        let hash = hash.into();

        check_identity(&id, &encryption_key, &file_name)?;

        let actual_length = file_length(&location)?;
        if actual_length != length {
            return Err(Error::InvalidArgument(format!(
                "the size of the encrypted content {} does not match ({} != {})",
                id, length, actual_length
            )));
        }

        let actual_hash = sha256_file(&location)?;
        if !actual_hash.eq_ignore_ascii_case(&hash) {
            return Err(Error::InvalidArgument(format!(
                "the SHA-256 digest of the encrypted content {} does not match",
                id
            )));
        }

        Ok(Self {
            id,
            encryption_key,
            location,
            file_name,
            length,
            hash,
        })
    }

    /// 由文件计算长度与摘要后构造，文件只读取一遍
    pub fn from_file(
        id: impl Into<String>,
        encryption_key: impl Into<String>,
        location: impl Into<PathBuf>,
        file_name: impl Into<String>,
    ) -> Result<Self> {
        let id = id.into();
        let encryption_key = encryption_key.into();
        let location = location.into();
        let file_name = file_name.into();

        check_identity(&id, &encryption_key, &file_name)?;
        let length = file_length(&location)?;
        let hash = sha256_file(&location)?;

        Ok(Self {
            id,
            encryption_key,
            location,
            file_name,
            length,
            hash,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn encryption_key(&self) -> &str {
        &self.encryption_key
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// 十六进制 SHA-256 摘要
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

fn check_identity(id: &str, encryption_key: &str, file_name: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidArgument("the content identifier cannot be empty".to_string()));
    }
    if encryption_key.is_empty() {
        return Err(Error::InvalidArgument(
            "the content encryption key cannot be empty".to_string(),
        ));
    }
    if file_name.is_empty() {
        return Err(Error::InvalidArgument(
            "the file name of the encrypted content cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn not_found(location: &Path) -> Error {
    Error::NotFound {
        message: format!(
            "the resource {} was not found or is not readable",
            location.display()
        ),
        source: None,
    }
}

fn file_length(location: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(location).map_err(|_| not_found(location))?;
    if !metadata.is_file() {
        return Err(not_found(location));
    }
    Ok(metadata.len())
}

/// 计算文件的十六进制 SHA-256 摘要
pub fn sha256_file(location: &Path) -> Result<String> {
    let file = File::open(location).map_err(|_| not_found(location))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(|_| not_found(location))?;
    Ok(hex::encode(hasher.finalize()))
}
