//! 取消闸门与会话状态机
//!
//! 会话状态：`Idle -> Running -> {Completed, Cancelled, Failed}`，
//! 请求分发失败时也可以从 `Idle` 直接进入 `Failed`。终止状态不可离开。
//!
//! 取消信号基于 [`CancellationToken`]：一旦触发永不复位，
//! 正在等待读取的 pump 通过 `cancelled()` 立即被唤醒。

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

/// 状态字节中的取消标记位，低位保存 [`SessionState`]
const TRIGGERED_BIT: u8 = 0x80;

/// 会话状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// 请求尚未分发
    #[default]
    Idle,
    /// 已拿到字节流，正在读取
    Running,
    /// 服务端正常关闭了流
    Completed,
    /// 被用户取消
    Cancelled,
    /// 传输失败
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }

    fn to_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Running => 1,
            SessionState::Completed => 2,
            SessionState::Cancelled => 3,
            SessionState::Failed => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value & !TRIGGERED_BIT {
            0 => SessionState::Idle,
            1 => SessionState::Running,
            2 => SessionState::Completed,
            3 => SessionState::Cancelled,
            _ => SessionState::Failed,
        }
    }
}

/// 取消闸门
///
/// 可克隆，所有克隆共享同一个信号和状态。触发方（用户操作）与 pump
/// 分别持有一份。
///
/// 取消标记与会话状态放在同一个原子字节里，`trigger` 与 `settle`
/// 通过 CAS 串行化：触发只可能落在 `Running` 期间。
#[derive(Debug, Clone, Default)]
pub struct CancellationGate {
    token: CancellationToken,
    state: Arc<AtomicU8>,
}

impl CancellationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前会话状态
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 触发取消
    ///
    /// 只在 `Running` 状态下生效；重复触发或其他状态下调用都是 no-op。
    /// 返回值表示本次调用是否真正触发了取消。
    pub fn trigger(&self) -> bool {
        let running = SessionState::Running.to_u8();
        if let Err(current) = self.state.compare_exchange(
            running,
            running | TRIGGERED_BIT,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            if current & TRIGGERED_BIT == 0 {
                debug!(state = ?SessionState::from_u8(current), "会话不在运行中，忽略取消请求");
            }
            return false;
        }
        self.token.cancel();
        debug!("已触发取消");
        true
    }

    /// 是否已触发取消
    pub fn is_triggered(&self) -> bool {
        self.state.load(Ordering::Acquire) & TRIGGERED_BIT != 0
    }

    /// 等待取消信号
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// `Idle -> Running`；已在运行中也返回 true
    pub fn begin(&self) -> bool {
        match self.state.compare_exchange(
            SessionState::Idle.to_u8(),
            SessionState::Running.to_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => SessionState::from_u8(current) == SessionState::Running,
        }
    }

    /// 进入终止状态，返回是否发生了迁移
    pub fn settle(&self, terminal: SessionState) -> bool {
        if !terminal.is_terminal() {
            return false;
        }

        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if SessionState::from_u8(current).is_terminal() {
                return false;
            }
            // 保留取消标记
            match self.state.compare_exchange(
                current,
                terminal.to_u8() | (current & TRIGGERED_BIT),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// 给控制端使用的句柄
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { gate: self.clone() }
    }
}

/// 取消控制端
///
/// 无参数、无返回值意义上的"停止"按钮；`stop()` 的布尔返回值
/// 仅供界面判断是否需要禁用按钮。
#[derive(Debug, Clone)]
pub struct StopHandle {
    gate: CancellationGate,
}

impl StopHandle {
    pub fn stop(&self) -> bool {
        self.gate.trigger()
    }

    pub fn is_stopped(&self) -> bool {
        self.gate.is_triggered()
    }

    pub fn state(&self) -> SessionState {
        self.gate.state()
    }
}
