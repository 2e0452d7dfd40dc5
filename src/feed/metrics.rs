//! 会话指标
//!
//! 记录一个扫描日志会话的 chunk / 字节 / 记录数量和时间点，
//! 会话结束时输出一行汇总日志。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 会话指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMetrics {
    /// 首个 chunk 到达的耗时（毫秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttfb_ms: Option<u64>,

    pub chunk_count: u32,

    pub total_bytes: usize,

    /// 发给输出端的记录数
    pub record_count: u32,

    /// 非法字节序列与流末尾残缺字符的数量
    pub decode_anomalies: u32,

    /// 未完成文本的峰值字节数
    pub peak_pending_bytes: usize,

    /// 流结束时被丢弃的未终止记录字节数
    pub dropped_tail_bytes: usize,

    pub start_time: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_chunk_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self {
            ttfb_ms: None,
            chunk_count: 0,
            total_bytes: 0,
            record_count: 0,
            decode_anomalies: 0,
            peak_pending_bytes: 0,
            dropped_tail_bytes: 0,
            start_time: Utc::now(),
            first_chunk_time: None,
            end_time: None,
        }
    }
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个 chunk，首个 chunk 同时计算 TTFB
    pub fn record_chunk(&mut self, bytes: usize) {
        self.chunk_count += 1;
        self.total_bytes += bytes;

        if self.first_chunk_time.is_none() {
            let now = Utc::now();
            self.first_chunk_time = Some(now);
            self.ttfb_ms = Some((now - self.start_time).num_milliseconds().max(0) as u64);
        }
    }

    pub fn record_dispatch(&mut self) {
        self.record_count += 1;
    }

    pub fn observe_pending(&mut self, pending: usize) {
        if pending > self.peak_pending_bytes {
            self.peak_pending_bytes = pending;
        }
    }

    pub fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// 总耗时；未结束时计算到当前时间
    pub fn duration_ms(&self) -> u64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds().max(0) as u64
    }

    pub fn summary(&self) -> String {
        let ttfb = self
            .ttfb_ms
            .map(|t| format!("{}ms", t))
            .unwrap_or_else(|| "N/A".to_string());

        format!(
            "chunks: {}, bytes: {}, records: {}, duration: {}ms, ttfb: {}, anomalies: {}",
            self.chunk_count,
            self.total_bytes,
            self.record_count,
            self.duration_ms(),
            ttfb,
            self.decode_anomalies
        )
    }

    pub fn log_summary(&self, session_id: &str) {
        info!(
            session_id,
            chunk_count = self.chunk_count,
            total_bytes = self.total_bytes,
            record_count = self.record_count,
            duration_ms = self.duration_ms(),
            ttfb_ms = ?self.ttfb_ms,
            decode_anomalies = self.decode_anomalies,
            peak_pending_bytes = self.peak_pending_bytes,
            dropped_tail_bytes = self.dropped_tail_bytes,
            "扫描日志会话指标"
        );
    }
}
