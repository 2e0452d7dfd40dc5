//! 扫描服务客户端
//!
//! 把 [`ScanRequest`] POST 到扫描接口，成功后返回响应体的字节流。
//! 会话编排（提示、取消、状态机）见 [`session`]。

pub mod request;
pub mod session;

pub use request::ScanRequest;
pub use session::ScanSession;

use crate::config::FeedConfig;
use crate::feed::error::FeedError;
use crate::feed::pump::ChunkSource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, info, warn};

/// 事件流的 Content-Type
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// 扫描服务客户端
///
/// 可以复用于多个会话。
#[derive(Debug, Clone)]
pub struct ScanClient {
    http: reqwest::Client,
    config: FeedConfig,
}

impl ScanClient {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout_duration())
            .build()
            .map_err(|e| FeedError::invalid_request(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// 发起扫描请求并返回响应体字节流
    ///
    /// 连接失败返回 `Connect`，非 2xx 返回 `Server`（携带响应体文本）。
    pub async fn open(&self, request: &ScanRequest) -> Result<ChunkSource, FeedError> {
        let url = self.config.scan_url()?;
        info!(url = %url, target = %request.url, "发起扫描请求");

        let response = self
            .http
            .post(url)
            .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE)
            .json(request)
            .send()
            .await
            .map_err(|e| match FeedError::from(e) {
                // 请求阶段的传输错误都算作连接失败
                FeedError::Transport(msg) => FeedError::Connect(msg),
                other => other,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "扫描接口返回错误状态");
            let message = self.read_error_body(response).await;
            return Err(FeedError::server(status.as_u16(), message.trim()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.starts_with(EVENT_STREAM_CONTENT_TYPE) {
            warn!(content_type, "响应不是 text/event-stream，仍按事件流读取");
        } else {
            debug!(content_type, "事件流已打开");
        }

        Ok(response_to_chunk_source(response))
    }

    /// 读取错误响应体
    ///
    /// 此时会话仍处于 `Idle`，无法取消，因此用连接超时限制读取时长。
    /// 读取失败或超时时退回到状态码的标准描述。
    async fn read_error_body(&self, response: reqwest::Response) -> String {
        let status = response.status();
        let fallback = || status.canonical_reason().unwrap_or_default().to_string();

        match tokio::time::timeout(self.config.connect_timeout_duration(), response.text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(status = status.as_u16(), error = %err, "读取错误响应体失败");
                fallback()
            }
            Err(_) => {
                warn!(status = status.as_u16(), "读取错误响应体超时");
                fallback()
            }
        }
    }
}

/// 把 reqwest 响应体转换为 [`ChunkSource`]
pub fn response_to_chunk_source(response: reqwest::Response) -> ChunkSource {
    let stream = response
        .bytes_stream()
        .map(|result| result.map_err(FeedError::from));

    Box::pin(stream)
}
