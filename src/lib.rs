//! 扫描日志流客户端
//!
//! 发起一次长时间运行的扫描，逐块读取服务端推送的事件流，
//! 解码、分帧后把每条日志记录交给输出端，并支持中途取消。

pub mod client;
pub mod config;
pub mod feed;

pub use client::{ScanClient, ScanRequest, ScanSession};
pub use config::{ConfigError, FeedConfig};
pub use feed::{
    CancellationGate, CompletionStatus, DispatchSink, FeedError, Notice, Record, ScanTranscript,
    SessionState, StopHandle, StreamPump,
};
