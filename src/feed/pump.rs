//! 字节流泵
//!
//! 从已打开的响应体中逐个读取 chunk，依次经过 [`ChunkDecoder`] 和
//! [`FrameBuffer`]，把切出的记录按到达顺序交给输出端。
//!
//! 同一时刻最多只有一个未完成的读取。每轮循环先检查取消信号；
//! 等待读取期间取消信号、会话期限与 chunk 间隔期限和读取本身一起 select，
//! 因此阻塞在慢读取上的 pump 会被立即唤醒，未完成的读取随字节流一起被 drop。

use crate::config::FeedConfig;
use crate::feed::cancel::{CancellationGate, SessionState};
use crate::feed::decoder::ChunkDecoder;
use crate::feed::error::FeedError;
use crate::feed::frame::FrameBuffer;
use crate::feed::metrics::FeedMetrics;
use crate::feed::sink::DispatchSink;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// 响应体字节流
///
/// drop 即关闭底层连接。
pub type ChunkSource = Pin<Box<dyn Stream<Item = Result<Bytes, FeedError>> + Send>>;

/// 会话终止状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    /// 服务端关闭了流
    Completed,
    /// 用户取消
    Cancelled,
    /// 与取消无关的失败
    Failed(FeedError),
}

impl CompletionStatus {
    pub fn state(&self) -> SessionState {
        match self {
            CompletionStatus::Completed => SessionState::Completed,
            CompletionStatus::Cancelled => SessionState::Cancelled,
            CompletionStatus::Failed(_) => SessionState::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionStatus::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CompletionStatus::Cancelled)
    }

    pub fn error(&self) -> Option<&FeedError> {
        match self {
            CompletionStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// 失败转换为 `Err`，完成与取消都是 `Ok`
    pub fn into_result(self) -> Result<SessionState, FeedError> {
        match self {
            CompletionStatus::Failed(err) => Err(err),
            other => Ok(other.state()),
        }
    }
}

/// 字节流泵
pub struct StreamPump {
    config: FeedConfig,
    session_id: String,
    metrics: FeedMetrics,
}

impl StreamPump {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            session_id: uuid::Uuid::new_v4().to_string(),
            metrics: FeedMetrics::new(),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(FeedConfig::default())
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// 最近一次 `run` 的指标
    pub fn metrics(&self) -> &FeedMetrics {
        &self.metrics
    }

    /// 运行到流结束、取消或失败
    ///
    /// 进入时把闸门从 `Idle` 切到 `Running`，返回前切到对应的终止状态。
    /// `source` 与解码、分帧状态在返回前全部释放。
    pub async fn run<S, K>(
        &mut self,
        source: S,
        sink: &mut K,
        gate: &CancellationGate,
    ) -> CompletionStatus
    where
        S: Stream<Item = Result<Bytes, FeedError>> + Unpin,
        K: DispatchSink + ?Sized,
    {
        self.metrics = FeedMetrics::new();

        if !gate.begin() {
            warn!(
                session_id = %self.session_id,
                state = ?gate.state(),
                "会话已结束，拒绝再次读取"
            );
            return CompletionStatus::Failed(FeedError::invalid_request("会话已结束"));
        }

        debug!(session_id = %self.session_id, "开始读取扫描日志流");

        let status = self.pump(source, sink, gate).await;
        gate.settle(status.state());
        self.metrics.finish();

        match &status {
            CompletionStatus::Completed => {
                debug!(session_id = %self.session_id, "扫描日志流已结束");
            }
            CompletionStatus::Cancelled => {
                info!(
                    session_id = %self.session_id,
                    records = self.metrics.record_count,
                    "扫描已被取消"
                );
            }
            CompletionStatus::Failed(err) => {
                error!(session_id = %self.session_id, error = %err, "扫描日志流失败");
            }
        }
        self.metrics.log_summary(&self.session_id);

        status
    }

    async fn pump<S, K>(&mut self, mut source: S, sink: &mut K, gate: &CancellationGate) -> CompletionStatus
    where
        S: Stream<Item = Result<Bytes, FeedError>> + Unpin,
        K: DispatchSink + ?Sized,
    {
        let mut decoder = ChunkDecoder::new();
        let mut frame = FrameBuffer::new();
        let limit = self.config.max_pending_bytes;
        let deadline = self.config.timeout_duration().map(|d| Instant::now() + d);

        let status = 'read: loop {
            if gate.is_triggered() {
                break CompletionStatus::Cancelled;
            }

            let idle_deadline = self
                .config
                .chunk_timeout_duration()
                .map(|d| Instant::now() + d);

            let item = tokio::select! {
                biased;
                _ = gate.cancelled() => break 'read CompletionStatus::Cancelled,
                _ = wait_until(deadline) => {
                    warn!(session_id = %self.session_id, "超过会话期限");
                    break 'read CompletionStatus::Failed(FeedError::Timeout);
                }
                _ = wait_until(idle_deadline) => {
                    warn!(session_id = %self.session_id, "等待下一个 chunk 超时");
                    break 'read CompletionStatus::Failed(FeedError::Timeout);
                }
                item = source.next() => item,
            };

            let chunk = match item {
                None => break CompletionStatus::Completed,
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => {
                    if gate.is_triggered() {
                        debug!(session_id = %self.session_id, error = %err, "取消导致的读取中断");
                        break CompletionStatus::Cancelled;
                    }
                    break CompletionStatus::Failed(err);
                }
            };

            if chunk.is_empty() {
                continue;
            }

            let first = self.metrics.chunk_count == 0;
            self.metrics.record_chunk(chunk.len());
            if first {
                debug!(
                    session_id = %self.session_id,
                    ttfb_ms = ?self.metrics.ttfb_ms,
                    "收到首个 chunk"
                );
            }

            let text = decoder.decode(&chunk);
            let records = frame.absorb(&text);
            self.metrics.observe_pending(frame.pending_len());

            for record in records {
                if gate.is_triggered() {
                    break 'read CompletionStatus::Cancelled;
                }
                sink.dispatch(record);
                self.metrics.record_dispatch();
            }

            if frame.pending_len() > limit {
                warn!(
                    session_id = %self.session_id,
                    pending = frame.pending_len(),
                    limit,
                    "未完成记录超过缓冲区上限"
                );
                break CompletionStatus::Failed(FeedError::BufferOverflow { limit });
            }
        };

        self.metrics.dropped_tail_bytes = frame.finish();
        decoder.finish();
        self.metrics.decode_anomalies = decoder.anomalies();
        drop(source);

        status
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
