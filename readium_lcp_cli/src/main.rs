//! Readium LCP 命令行客户端

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use clap::{Args, Parser, Subcommand};
use readium_lcp_core::datetime::w3c;
use readium_lcp_core::{
    ClientConfig, Device, Encryption, LicenseServerClient, LicenseStatusClient, PartialLicense, ProtectedContent,
    Rights, User,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lcp-client")]
#[command(about = "Readium LCP 许可证服务器与状态服务器客户端工具", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// 许可证服务器地址
    #[arg(long, env = "LCP_URL", global = true)]
    lcp_url: Option<String>,

    /// 许可证状态服务器地址
    #[arg(long, env = "LSD_URL", global = true)]
    lsd_url: Option<String>,

    /// Basic 认证用户名，覆盖环境变量
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Basic 认证密码，覆盖环境变量
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// 请求超时（秒）
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// 登记外部加密工具产出的加密内容
    AddContent {
        /// 内容 ID
        #[arg(long)]
        id: String,
        /// 内容加密密钥（base64）
        #[arg(long)]
        key: String,
        /// 加密文件路径
        #[arg(long)]
        file: PathBuf,
        /// 下载时使用的文件名，默认取加密文件名
        #[arg(long)]
        file_name: Option<String>,
    },
    /// 下载加密内容
    Content {
        content_id: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// 生成许可证
    GenerateLicense {
        content_id: String,
        /// 部分许可证 JSON 文件
        #[arg(long)]
        partial: PathBuf,
    },
    /// 生成带许可证的出版物
    GeneratePublication {
        content_id: String,
        /// 部分许可证 JSON 文件
        #[arg(long)]
        partial: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// 获取已有许可证
    FetchLicense {
        license_id: String,
        /// 包含 user 与 encryption 的 JSON 文件
        #[arg(long)]
        request: PathBuf,
    },
    /// 获取带许可证的出版物
    FetchPublication {
        license_id: String,
        /// 包含 user 与 encryption 的 JSON 文件
        #[arg(long)]
        request: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// 分页列出许可证
    ListLicenses {
        #[command(flatten)]
        pagination: Pagination,
    },
    /// 分页列出某内容下的许可证
    ContentLicenses {
        content_id: String,
        #[command(flatten)]
        pagination: Pagination,
    },
    /// 更新许可证权限
    UpdateRights {
        license_id: String,
        /// 权限 JSON 文件
        #[arg(long)]
        rights: PathBuf,
    },
    /// 查询许可证状态
    Status { license_id: String },
    /// 注册设备
    Register {
        license_id: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// 归还借阅
    Return {
        license_id: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// 续借
    Renew {
        license_id: String,
        #[arg(long, requires = "device_name")]
        device_id: Option<String>,
        #[arg(long, requires = "device_id")]
        device_name: Option<String>,
        /// 新的到期时间，如 2024-06-01T12:00:00+02:00
        #[arg(long)]
        end: Option<String>,
    },
    /// 取消借阅
    Cancel {
        license_id: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// 撤销借阅
    Revoke {
        license_id: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// 分页列出许可证状态
    Licenses {
        /// 只列出注册设备数不少于该值的许可证
        #[arg(long, allow_negative_numbers = true)]
        devices: Option<i64>,
        #[command(flatten)]
        pagination: Pagination,
    },
    /// 列出许可证已注册的设备
    Devices { license_id: String },
}

#[derive(Args)]
struct Pagination {
    #[arg(long, allow_negative_numbers = true)]
    page: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    per_page: Option<i64>,
}

#[derive(Args)]
struct DeviceArgs {
    #[arg(long)]
    device_id: String,
    #[arg(long)]
    device_name: String,
}

impl DeviceArgs {
    fn device(&self) -> anyhow::Result<Device> {
        Ok(Device::new(&self.device_id, &self.device_name)?)
    }
}

/// 获取许可证时的请求文件
#[derive(Deserialize)]
struct LicenseRequest {
    user: User,
    encryption: Encryption,
}

#[derive(Serialize)]
struct Outcome {
    success: bool,
}

impl GlobalOpts {
    /// 以 `prefix` 对应的环境变量为基础，叠加命令行参数
    fn config(&self, prefix: &str, url: Option<&String>) -> anyhow::Result<ClientConfig> {
        let url = url.with_context(|| {
            format!("use --{}-url or set {}_URL", prefix.to_lowercase(), prefix)
        })?;
        let mut config = ClientConfig::default().with_env(prefix);
        config.server_url = url.clone();
        config.base_url()?;

        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        Ok(config)
    }

    fn server(&self) -> anyhow::Result<LicenseServerClient> {
        Ok(LicenseServerClient::new(self.config("LCP", self.lcp_url.as_ref())?)?)
    }

    fn status(&self) -> anyhow::Result<LicenseStatusClient> {
        Ok(LicenseStatusClient::new(self.config("LSD", self.lsd_url.as_ref())?)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = &cli.global;

    match cli.command {
        Commands::AddContent { id, key, file, file_name } => {
            let file_name = match file_name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .context("cannot derive a file name, use --file-name")?,
            };
            let content = ProtectedContent::from_file(id, key, &file, file_name)?;
            print_outcome(global.server()?.add_encryption_data(&content).await?)?;
        }
        Commands::Content { content_id, output } => {
            let saved = global.server()?.content(&content_id, &output).await?;
            report_saved(saved, &output);
            print_outcome(saved)?;
        }
        Commands::GenerateLicense { content_id, partial } => {
            let partial: PartialLicense = read_json(&partial)?;
            print_json(&global.server()?.generate_license(&content_id, &partial).await?)?;
        }
        Commands::GeneratePublication { content_id, partial, output } => {
            let partial: PartialLicense = read_json(&partial)?;
            let saved = global
                .server()?
                .generate_licensed_publication(&content_id, &partial, &output)
                .await?;
            report_saved(saved, &output);
            print_outcome(saved)?;
        }
        Commands::FetchLicense { license_id, request } => {
            let request: LicenseRequest = read_json(&request)?;
            let license = global
                .server()?
                .fetch_license(&license_id, &request.user, &request.encryption)
                .await?;
            print_json(&license)?;
        }
        Commands::FetchPublication { license_id, request, output } => {
            let request: LicenseRequest = read_json(&request)?;
            let saved = global
                .server()?
                .fetch_publication(&license_id, &request.user, &request.encryption, &output)
                .await?;
            report_saved(saved, &output);
            print_outcome(saved)?;
        }
        Commands::ListLicenses { pagination } => {
            let licenses = global.server()?.list_licenses(pagination.page, pagination.per_page).await?;
            print_json(&licenses)?;
        }
        Commands::ContentLicenses { content_id, pagination } => {
            let licenses = global
                .server()?
                .list_licenses_by_content(&content_id, pagination.page, pagination.per_page)
                .await?;
            print_json(&licenses)?;
        }
        Commands::UpdateRights { license_id, rights } => {
            let rights: Rights = read_json(&rights)?;
            print_outcome(global.server()?.update_license_rights(&license_id, &rights).await?)?;
        }
        Commands::Status { license_id } => {
            print_json(&global.status()?.license_status(&license_id).await?)?;
        }
        Commands::Register { license_id, device } => {
            let device = device.device()?;
            print_json(&global.status()?.license_register_device(&license_id, &device).await?)?;
        }
        Commands::Return { license_id, device } => {
            let device = device.device()?;
            print_json(&global.status()?.lending_return(&license_id, &device).await?)?;
        }
        Commands::Renew { license_id, device_id, device_name, end } => {
            let device = match (device_id, device_name) {
                (Some(id), Some(name)) => Some(Device::new(id, name)?),
                _ => None,
            };
            let end = end.as_deref().map(parse_end).transpose()?;
            let status = global
                .status()?
                .lending_renewal(&license_id, device.as_ref(), end)
                .await?;
            print_json(&status)?;
        }
        Commands::Cancel { license_id, message } => {
            print_outcome(global.status()?.lending_cancel(&license_id, message.as_deref()).await?)?;
        }
        Commands::Revoke { license_id, message } => {
            print_outcome(global.status()?.lending_revoke(&license_id, message.as_deref()).await?)?;
        }
        Commands::Licenses { devices, pagination } => {
            let statuses = global
                .status()?
                .licenses(devices, pagination.page, pagination.per_page)
                .await?;
            print_json(&statuses)?;
        }
        Commands::Devices { license_id } => {
            print_json(&global.status()?.list_registered_devices(&license_id).await?)?;
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON document in {}", path.display()))
}

fn parse_end(value: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    w3c::parse(value).with_context(|| format!("invalid end date {}, expected e.g. 2024-06-01T12:00:00+02:00", value))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome(success: bool) -> anyhow::Result<()> {
    print_json(&Outcome { success })
}

fn report_saved(saved: bool, output: &Path) {
    if saved {
        info!("Saved to {}", output.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_renew_with_device() {
        let cli = Cli::try_parse_from([
            "lcp-client",
            "--lsd-url",
            "https://lsd.example.org",
            "renew",
            "L1",
            "--device-id",
            "dev-1",
            "--device-name",
            "My Reader",
            "--end",
            "2024-06-01T12:00:00+02:00",
        ])
        .unwrap();

        assert_eq!(cli.global.lsd_url.as_deref(), Some("https://lsd.example.org"));
        match cli.command {
            Commands::Renew { license_id, device_id, end, .. } => {
                assert_eq!(license_id, "L1");
                assert_eq!(device_id.as_deref(), Some("dev-1"));
                assert!(parse_end(end.as_deref().unwrap()).is_ok());
            }
            _ => panic!("expected renew"),
        }
    }

    #[test]
    fn test_renew_device_id_requires_name() {
        assert!(Cli::try_parse_from(["lcp-client", "renew", "L1", "--device-id", "dev-1"]).is_err());
    }

    #[test]
    fn test_negative_pagination_is_accepted_by_parser() {
        let cli = Cli::try_parse_from(["lcp-client", "licenses", "--page", "-1"]).unwrap();
        match cli.command {
            Commands::Licenses { pagination, .. } => assert_eq!(pagination.page, Some(-1)),
            _ => panic!("expected licenses"),
        }
    }

    #[test]
    fn test_config_overrides() {
        let global = GlobalOpts {
            lcp_url: Some("https://lcp.example.org".to_string()),
            lsd_url: None,
            username: Some("admin".to_string()),
            password: Some("s3cret".to_string()),
            timeout: Some(5),
        };
        let config = global.config("LCPCLITEST", global.lcp_url.as_ref()).unwrap();
        assert_eq!(config.server_url, "https://lcp.example.org");
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.timeout, 5);
    }

    #[test]
    fn test_config_keeps_env_timeout_and_tls_with_url_flag() {
        std::env::set_var("LCPCLITEST_T_TIMEOUT_SECS", "7");
        std::env::set_var("LCPCLITEST_T_VERIFY_TLS", "false");
        std::env::set_var("LCPCLITEST_T_USERNAME", "reader");
        let global = GlobalOpts {
            lcp_url: Some("https://lcp.example.org".to_string()),
            lsd_url: None,
            username: None,
            password: None,
            timeout: None,
        };
        let config = global.config("LCPCLITEST_T", global.lcp_url.as_ref()).unwrap();
        assert_eq!(config.server_url, "https://lcp.example.org");
        assert_eq!(config.username, "reader");
        assert_eq!(config.timeout, 7);
        assert!(!config.verify_tls);
    }

    #[test]
    fn test_config_requires_url() {
        let global = GlobalOpts { lcp_url: None, lsd_url: None, username: None, password: None, timeout: None };
        let err = global.config("LCPCLITEST_NONE", None).unwrap_err();
        assert!(err.to_string().contains("LCPCLITEST_NONE_URL"));
    }

    #[test]
    fn test_parse_end_rejects_garbage() {
        assert!(parse_end("tomorrow").is_err());
    }
}
