//! 记录分帧缓冲区
//!
//! 累积解码后的文本，按空行（`"\n\n"`）切出完整的事件块。
//! 每个事件块中只保留以 `data:` 开头的行，去掉前缀并 trim 后
//! 以 `\n` 连接成一条 [`Record`]。其余行（注释、keep-alive 等）直接丢弃。
//!
//! 流结束时缓冲区中残留的不完整记录不会被发出。

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// 事件数据行前缀（严格匹配行首）
pub const DATA_MARKER: &str = "data:";

/// 记录分隔符
pub const RECORD_DELIMITER: &str = "\n\n";

/// 一条完整的扫描日志记录
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(String);

impl Record {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Record {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl PartialEq<&str> for Record {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// 分帧缓冲区
///
/// 不变量：`pending` 中不包含完整的分隔符，最多只有一条未完成的记录。
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: String,
    /// 已切出的事件块数量（包括没有 data 行的块）
    blocks_seen: u64,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前未完成文本的字节数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn blocks_seen(&self) -> u64 {
        self.blocks_seen
    }

    /// 追加一段文本并切出所有完整记录（按到达顺序）
    pub fn absorb(&mut self, fragment: &str) -> Vec<Record> {
        if fragment.is_empty() {
            return Vec::new();
        }

        // 分隔符可能跨越上一段的结尾，从旧文本的最后一个字节开始查找
        let mut resume = self.pending.len().saturating_sub(RECORD_DELIMITER.len() - 1);
        while !self.pending.is_char_boundary(resume) {
            resume -= 1;
        }
        self.pending.push_str(fragment);

        let mut records = Vec::new();
        let mut consumed = 0;
        let mut search_from = resume;

        while let Some(offset) = self.pending[search_from..].find(RECORD_DELIMITER) {
            let end = search_from + offset;
            self.blocks_seen += 1;
            if let Some(record) = parse_block(&self.pending[consumed..end]) {
                records.push(record);
            }
            consumed = end + RECORD_DELIMITER.len();
            search_from = consumed;
        }

        if consumed > 0 {
            self.pending.drain(..consumed);
        }

        records
    }

    /// 流结束：丢弃残留的不完整记录，返回被丢弃的字节数
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            debug!(dropped_bytes = dropped, "流结束时丢弃未终止的记录");
        }
        self.pending.clear();
        self.pending.shrink_to_fit();
        dropped
    }
}

/// 解析一个事件块，没有 data 行时返回 None
fn parse_block(block: &str) -> Option<Record> {
    let mut lines = Vec::new();

    for line in block.split('\n') {
        match line.strip_prefix(DATA_MARKER) {
            Some(content) => lines.push(content.trim()),
            None => {
                if line.contains(DATA_MARKER) {
                    debug!(line, "data 标记不在行首，已忽略");
                }
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(Record::new(lines.join("\n")))
    }
}
