//! 扫描日志流核心模块
//!
//! 把分块到达的 HTTP 响应体转换为有序的日志记录，并支持随时取消。
//!
//! # 主要组件
//!
//! - `decoder`: 增量 UTF-8 解码
//! - `frame`: 按空行切分记录
//! - `cancel`: 取消闸门与会话状态机
//! - `pump`: 读取循环
//! - `sink`: 记录输出端
//! - `error`: 错误类型
//! - `metrics`: 会话指标

pub mod cancel;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod pump;
pub mod sink;

pub use cancel::{CancellationGate, SessionState, StopHandle};
pub use decoder::ChunkDecoder;
pub use error::FeedError;
pub use frame::{FrameBuffer, Record, DATA_MARKER, RECORD_DELIMITER};
pub use metrics::FeedMetrics;
pub use pump::{ChunkSource, CompletionStatus, StreamPump};
pub use sink::{sink_fn, DispatchSink, Entry, FnSink, Notice, ScanTranscript};
