//! 增量 UTF-8 解码器
//!
//! chunk 边界可能切断一个多字节字符。被切断的尾部字节保存在解码器中，
//! 下一个 chunk 到达时拼接在前面再解码。非法字节序列替换为 U+FFFD，
//! 记为一次解码异常，不会中断会话。

use tracing::warn;

const REPLACEMENT: char = '\u{FFFD}';

/// chunk 解码器
///
/// 每个会话一个实例，会话结束即丢弃。
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    /// 上一个 chunk 末尾不完整的多字节序列（最多 3 字节）
    carry: Vec<u8>,
    /// 解码异常计数
    anomalies: u32,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解码异常计数
    pub fn anomalies(&self) -> u32 {
        self.anomalies
    }

    /// 当前保留的不完整字节数
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    /// 解码一个 chunk
    ///
    /// 返回可以确定的文本；末尾不完整的字符留到下一次调用。
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        if self.carry.is_empty() {
            return self.decode_slice(chunk);
        }

        let mut joined = std::mem::take(&mut self.carry);
        joined.extend_from_slice(chunk);
        self.decode_slice(&joined)
    }

    /// 流结束：不完整的尾部字节无法再补全，计为一次异常并丢弃
    pub fn finish(&mut self) -> usize {
        let dropped = self.carry.len();
        if dropped > 0 {
            self.anomalies += 1;
            warn!(dropped_bytes = dropped, "流结束时存在不完整的 UTF-8 序列");
            self.carry.clear();
        }
        dropped
    }

    fn decode_slice(&mut self, mut bytes: &[u8]) -> String {
        let mut text = String::with_capacity(bytes.len());

        loop {
            match std::str::from_utf8(bytes) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = bytes.split_at(e.valid_up_to());
                    // valid_up_to 之前的字节已由标准库校验
                    text.push_str(std::str::from_utf8(valid).unwrap_or_default());

                    match e.error_len() {
                        Some(bad) => {
                            self.anomalies += 1;
                            warn!(
                                invalid_bytes = bad,
                                anomalies = self.anomalies,
                                "解码异常，已替换为 U+FFFD"
                            );
                            text.push(REPLACEMENT);
                            bytes = &rest[bad..];
                        }
                        None => {
                            self.carry.extend_from_slice(rest);
                            break;
                        }
                    }
                }
            }
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii() {
        let mut decoder = ChunkDecoder::new();
        assert_eq!(decoder.decode(b"data: hello\n\n"), "data: hello\n\n");
        assert_eq!(decoder.pending_bytes(), 0);
        assert_eq!(decoder.anomalies(), 0);
    }

    #[test]
    fn test_decode_split_multibyte() {
        let bytes = "链接".as_bytes();
        let mut decoder = ChunkDecoder::new();

        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.pending_bytes(), 1);
        assert_eq!(decoder.decode(&bytes[1..4]), "链");
        assert_eq!(decoder.decode(&bytes[4..5]), "");
        assert_eq!(decoder.decode(&bytes[5..]), "接");
        assert_eq!(decoder.anomalies(), 0);
    }

    #[test]
    fn test_decode_four_byte_split_each_byte() {
        let bytes = "a😀b".as_bytes();
        let mut decoder = ChunkDecoder::new();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(b)));
        }
        assert_eq!(out, "a😀b");
        assert_eq!(decoder.anomalies(), 0);
    }

    #[test]
    fn test_decode_invalid_byte_is_replaced() {
        let mut decoder = ChunkDecoder::new();
        let out = decoder.decode(b"ok\xFFstill ok");
        assert_eq!(out, "ok\u{FFFD}still ok");
        assert_eq!(decoder.anomalies(), 1);
    }

    #[test]
    fn test_decode_invalid_continuation_after_carry() {
        let mut decoder = ChunkDecoder::new();
        // 0xE9 开始一个三字节序列，但下一个字节不是续字节
        assert_eq!(decoder.decode(b"x\xE9"), "x");
        assert_eq!(decoder.decode(b"y"), "\u{FFFD}y");
        assert_eq!(decoder.anomalies(), 1);
    }

    #[test]
    fn test_finish_drops_incomplete_tail() {
        let mut decoder = ChunkDecoder::new();
        decoder.decode(&"é".as_bytes()[..1]);
        assert_eq!(decoder.finish(), 1);
        assert_eq!(decoder.pending_bytes(), 0);
        assert_eq!(decoder.anomalies(), 1);

        assert_eq!(decoder.finish(), 0);
        assert_eq!(decoder.anomalies(), 1);
    }
}
