//! 记录输出端
//!
//! pump 每切出一条记录就调用一次 [`DispatchSink::dispatch`]，顺序与到达顺序一致。
//! 会话层额外通过 `opened` / `notify` 通知界面状态变化，默认实现为空。

use crate::feed::frame::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 会话级提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notice {
    /// 请求已发出，等待服务端响应
    Scanning,
    /// 用户取消
    Stopped,
    /// 会话失败，携带原因
    Failed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Scanning => write!(f, "Scanning..."),
            Notice::Stopped => write!(f, "Scan stopped by user."),
            Notice::Failed(reason) => write!(f, "Error: {}", reason),
        }
    }
}

/// 记录输出端
pub trait DispatchSink {
    /// 接收一条记录
    fn dispatch(&mut self, record: Record);

    /// 字节流已打开
    fn opened(&mut self) {}

    /// 会话级提示
    fn notify(&mut self, _notice: &Notice) {}
}

impl<K: DispatchSink + ?Sized> DispatchSink for &mut K {
    fn dispatch(&mut self, record: Record) {
        (**self).dispatch(record);
    }

    fn opened(&mut self) {
        (**self).opened();
    }

    fn notify(&mut self, notice: &Notice) {
        (**self).notify(notice);
    }
}

impl<K: DispatchSink + ?Sized> DispatchSink for Box<K> {
    fn dispatch(&mut self, record: Record) {
        (**self).dispatch(record);
    }

    fn opened(&mut self) {
        (**self).opened();
    }

    fn notify(&mut self, notice: &Notice) {
        (**self).notify(notice);
    }
}

/// 收集记录，主要用于测试
impl DispatchSink for Vec<Record> {
    fn dispatch(&mut self, record: Record) {
        self.push(record);
    }
}

/// 闭包输出端
pub struct FnSink<F>(F);

/// 用闭包构造输出端
pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(Record),
{
    FnSink(f)
}

impl<F> DispatchSink for FnSink<F>
where
    F: FnMut(Record),
{
    fn dispatch(&mut self, record: Record) {
        (self.0)(record);
    }
}

/// 扫描输出记录的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Entry {
    Record(Record),
    Notice(Notice),
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Record(record) => write!(f, "{}", record),
            Entry::Notice(notice) => write!(f, "{}", notice),
        }
    }
}

/// 扫描输出面板
///
/// 依次保存记录和提示。`Scanning...` 占位提示在字节流打开时被清除，
/// 之后的记录和提示只追加，不会回改。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanTranscript {
    entries: Vec<Entry>,
}

impl ScanTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Record(record) => Some(record),
            Entry::Notice(_) => None,
        })
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Notice(notice) => Some(notice),
            Entry::Record(_) => None,
        })
    }

    /// 每个条目一行
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DispatchSink for ScanTranscript {
    fn dispatch(&mut self, record: Record) {
        self.entries.push(Entry::Record(record));
    }

    fn opened(&mut self) {
        self.entries
            .retain(|entry| !matches!(entry, Entry::Notice(Notice::Scanning)));
    }

    fn notify(&mut self, notice: &Notice) {
        self.entries.push(Entry::Notice(notice.clone()));
    }
}
