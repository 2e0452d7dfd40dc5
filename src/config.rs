//! 客户端配置
//!
//! 从 `~/.scanfeed/config.toml` 读取，文件不存在时使用默认值。
//! 所有字段都有默认值，配置文件中只需写出要覆盖的部分。

use crate::feed::error::FeedError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use url::Url;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置文件失败: {0}")]
    Parse(#[from] toml::de::Error),
}

/// 扫描日志客户端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// 扫描服务地址
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// 流式扫描接口路径
    #[serde(default = "default_scan_path")]
    pub scan_path: String,

    /// 未完成记录的最大字节数
    #[serde(default = "default_max_pending_bytes")]
    pub max_pending_bytes: usize,

    /// 会话总期限（毫秒），不设置则一直读到服务端关闭
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// 两个 chunk 之间的最大间隔（毫秒）
    #[serde(default)]
    pub chunk_timeout_ms: Option<u64>,

    /// 建立连接的超时时间（毫秒）
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_scan_path() -> String {
    "/scan".to_string()
}

fn default_max_pending_bytes() -> usize {
    1024 * 1024 // 1MB
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            scan_path: default_scan_path(),
            max_pending_bytes: default_max_pending_bytes(),
            timeout_ms: None,
            chunk_timeout_ms: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl FeedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_scan_path(mut self, scan_path: impl Into<String>) -> Self {
        self.scan_path = scan_path.into();
        self
    }

    pub fn with_max_pending_bytes(mut self, bytes: usize) -> Self {
        self.max_pending_bytes = bytes;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_chunk_timeout_ms(mut self, chunk_timeout_ms: Option<u64>) -> Self {
        self.chunk_timeout_ms = chunk_timeout_ms;
        self
    }

    pub fn with_connect_timeout_ms(mut self, connect_timeout_ms: u64) -> Self {
        self.connect_timeout_ms = connect_timeout_ms;
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn chunk_timeout_duration(&self) -> Option<Duration> {
        self.chunk_timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// 拼接扫描接口的完整 URL，只接受 http / https
    pub fn scan_url(&self) -> Result<Url, FeedError> {
        let base = Url::parse(&self.endpoint)
            .map_err(|e| FeedError::invalid_request(format!("endpoint 无效 {}: {}", self.endpoint, e)))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(FeedError::invalid_request(format!(
                "不支持的协议: {}",
                base.scheme()
            )));
        }

        base.join(&self.scan_path)
            .map_err(|e| FeedError::invalid_request(format!("scan_path 无效 {}: {}", self.scan_path, e)))
    }

    /// 解析 TOML 文本
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// 读取配置文件，文件不存在时返回默认配置
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = expand_tilde(path);

        if !path.exists() {
            tracing::info!("未找到配置文件，使用默认配置: {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;

        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), endpoint = %config.endpoint, "已加载配置");
        Ok(config)
    }
}

/// 默认配置文件路径 `~/.scanfeed/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scanfeed")
        .join("config.toml")
}

/// 展开以 `~` 或 `~/` 开头的路径，其他形式原样返回
pub fn expand_tilde(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    let Some(home) = dirs::home_dir() else {
        return path.to_path_buf();
    };

    if path_str == "~" {
        home
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        home.join(rest)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = FeedConfig::default();
        assert_eq!(config.endpoint, "http://127.0.0.1:5000");
        assert_eq!(config.scan_path, "/scan");
        assert_eq!(config.max_pending_bytes, 1024 * 1024);
        assert_eq!(config.timeout_ms, None);
        assert_eq!(config.chunk_timeout_ms, None);
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_config_builder_and_durations() {
        let config = FeedConfig::new()
            .with_endpoint("https://scanner.local:8443")
            .with_timeout_ms(Some(5_000))
            .with_chunk_timeout_ms(Some(1_000))
            .with_connect_timeout_ms(250);

        assert_eq!(config.timeout_duration(), Some(Duration::from_millis(5_000)));
        assert_eq!(config.chunk_timeout_duration(), Some(Duration::from_millis(1_000)));
        assert_eq!(config.connect_timeout_duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_scan_url() {
        let url = FeedConfig::default().scan_url().unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/scan");

        let url = FeedConfig::default()
            .with_endpoint("https://example.com/base/")
            .with_scan_path("stream")
            .scan_url()
            .unwrap();
        assert_eq!(url.as_str(), "https://example.com/base/stream");
    }

    #[test]
    fn test_scan_url_rejects_bad_endpoint() {
        let err = FeedConfig::default()
            .with_endpoint("ftp://example.com")
            .scan_url()
            .unwrap_err();
        assert!(matches!(err, FeedError::InvalidRequest(_)));

        let err = FeedConfig::default()
            .with_endpoint("not a url")
            .scan_url()
            .unwrap_err();
        assert!(matches!(err, FeedError::InvalidRequest(_)));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = FeedConfig::from_toml_str(
            r#"
endpoint = "http://10.0.0.2:5000"
chunk_timeout_ms = 30000
"#,
        )
        .unwrap();

        assert_eq!(config.endpoint, "http://10.0.0.2:5000");
        assert_eq!(config.chunk_timeout_ms, Some(30_000));
        assert_eq!(config.scan_path, "/scan");
        assert_eq!(config.max_pending_bytes, 1024 * 1024);
    }

    #[test]
    fn test_from_toml_invalid() {
        let err = FeedConfig::from_toml_str("max_pending_bytes = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = FeedConfig::load(dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(config, FeedConfig::default());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "scan_path = \"/v2/scan\"\ntimeout_ms = 60000\n")
            .await
            .expect("write config");

        let config = FeedConfig::load(&path).await.unwrap();
        assert_eq!(config.scan_path, "/v2/scan");
        assert_eq!(config.timeout_ms, Some(60_000));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/etc/scanfeed.toml"), PathBuf::from("/etc/scanfeed.toml"));
        assert_eq!(expand_tilde("~other/x"), PathBuf::from("~other/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~"), home);
            assert_eq!(expand_tilde("~/.scanfeed"), home.join(".scanfeed"));
        }
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with(".scanfeed/config.toml"));
    }
}
