//! 扫描会话
//!
//! 一个会话只运行一次：`Idle` 时发出请求，拿到字节流后进入 `Running`，
//! 由 [`StreamPump`] 读到终止状态。输出端依次收到：
//!
//! 1. `Notice::Scanning`
//! 2. `opened()`（字节流已打开；请求失败时没有这一步）
//! 3. 按顺序的记录
//! 4. 取消时一条 `Notice::Stopped`，失败时一条 `Notice::Failed`

use crate::client::{ScanClient, ScanRequest};
use crate::feed::cancel::{CancellationGate, SessionState, StopHandle};
use crate::feed::pump::{CompletionStatus, StreamPump};
use crate::feed::sink::{DispatchSink, Notice};
use tracing::{info, warn};

/// 扫描会话
pub struct ScanSession {
    client: ScanClient,
    gate: CancellationGate,
    session_id: String,
}

impl ScanSession {
    pub fn new(client: ScanClient) -> Self {
        Self {
            client,
            gate: CancellationGate::new(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.gate.state()
    }

    /// 停止控制端，可以交给其他任务或线程
    pub fn stop_handle(&self) -> StopHandle {
        self.gate.stop_handle()
    }

    /// 运行会话直到结束
    pub async fn run<K>(self, request: &ScanRequest, sink: &mut K) -> CompletionStatus
    where
        K: DispatchSink + ?Sized,
    {
        info!(session_id = %self.session_id, url = %request.url, "开始扫描");
        sink.notify(&Notice::Scanning);

        let source = match self.client.open(request).await {
            Ok(source) => source,
            Err(err) => {
                self.gate.settle(SessionState::Failed);
                warn!(
                    session_id = %self.session_id,
                    dispatch = err.is_dispatch_failure(),
                    error = %err,
                    "扫描请求未能打开事件流"
                );
                sink.notify(&Notice::Failed(err.to_string()));
                return CompletionStatus::Failed(err);
            }
        };

        sink.opened();

        let mut pump =
            StreamPump::new(self.client.config().clone()).with_session_id(self.session_id.as_str());
        let status = pump.run(source, sink, &self.gate).await;

        match &status {
            CompletionStatus::Completed => {}
            CompletionStatus::Cancelled => sink.notify(&Notice::Stopped),
            CompletionStatus::Failed(err) => {
                if err.is_mid_stream() {
                    warn!(
                        session_id = %self.session_id,
                        records = pump.metrics().record_count,
                        "事件流在读取途中中断"
                    );
                }
                sink.notify(&Notice::Failed(err.to_string()));
            }
        }

        info!(
            session_id = %self.session_id,
            state = ?self.gate.state(),
            records = pump.metrics().record_count,
            "扫描结束"
        );

        status
    }
}
