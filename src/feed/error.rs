//! 扫描日志流错误类型
//!
//! 只有会话级别的终止错误会越过核心边界。解码异常、未终止的记录
//! 以及取消导致的中断都不属于错误，不在这里定义。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 扫描日志流错误
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum FeedError {
    /// 请求未能建立连接（DNS 失败、连接被拒绝等）
    #[error("连接失败: {0}")]
    Connect(String),

    /// 服务端返回了非 2xx 状态
    #[error("服务端错误 ({status}): {message}")]
    Server {
        /// HTTP 状态码
        status: u16,
        /// 响应体文本
        message: String,
    },

    /// 读取响应体过程中传输层出错（连接重置、响应被截断等）
    #[error("传输错误: {0}")]
    Transport(String),

    /// 超过配置的会话期限或 chunk 间隔
    #[error("扫描日志流超时")]
    Timeout,

    /// 未完成的记录超过了缓冲区上限
    #[error("缓冲区溢出 (上限 {limit} 字节)")]
    BufferOverflow {
        /// 配置的上限
        limit: usize,
    },

    /// 请求描述无效（例如 endpoint 不是 http/https）
    #[error("无效请求: {0}")]
    InvalidRequest(String),
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        FeedError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout
        } else if err.is_connect() {
            FeedError::Connect(err.to_string())
        } else if err.is_builder() {
            FeedError::InvalidRequest(err.to_string())
        } else if let Some(status) = err.status() {
            FeedError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            FeedError::Transport(err.to_string())
        }
    }
}

impl FeedError {
    pub fn connect(msg: impl Into<String>) -> Self {
        FeedError::Connect(msg.into())
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        FeedError::Server {
            status,
            message: message.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        FeedError::Transport(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        FeedError::InvalidRequest(msg.into())
    }

    /// 是否在流已打开之后才发生
    pub fn is_mid_stream(&self) -> bool {
        matches!(
            self,
            FeedError::Transport(_) | FeedError::Timeout | FeedError::BufferOverflow { .. }
        )
    }

    /// 是否发生在请求分发阶段（流尚未打开）
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(
            self,
            FeedError::Connect(_) | FeedError::Server { .. } | FeedError::InvalidRequest(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_display() {
        let err = FeedError::connect("connection refused");
        assert_eq!(err.to_string(), "连接失败: connection refused");

        let err = FeedError::server(502, "bad gateway");
        assert_eq!(err.to_string(), "服务端错误 (502): bad gateway");

        assert_eq!(FeedError::Timeout.to_string(), "扫描日志流超时");
        assert_eq!(
            FeedError::BufferOverflow { limit: 16 }.to_string(),
            "缓冲区溢出 (上限 16 字节)"
        );
    }

    #[test]
    fn test_feed_error_classification() {
        assert!(FeedError::transport("reset").is_mid_stream());
        assert!(FeedError::Timeout.is_mid_stream());
        assert!(!FeedError::connect("refused").is_mid_stream());

        assert!(FeedError::connect("refused").is_dispatch_failure());
        assert!(FeedError::server(500, "boom").is_dispatch_failure());
        assert!(!FeedError::BufferOverflow { limit: 1 }.is_dispatch_failure());
    }

    #[test]
    fn test_feed_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: FeedError = io_err.into();
        assert!(matches!(err, FeedError::Transport(_)));
    }

    #[test]
    fn test_feed_error_serialization() {
        let err = FeedError::server(503, "unavailable");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"Server\""));
        let back: FeedError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
