//! 视口折行引擎
//!
//! 针对任意列宽从线性文本推导显示行及每行的起始偏移。折行是贪心的逐列填充，
//! 不识别单词边界；显式换行符总是立即结束当前行，并作为分隔符被消耗。

use unicode_width::UnicodeWidthChar;

/// 折行结果：每一行及其在线性文本中的起始偏移（码点）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapResult {
    pub lines: Vec<String>,
    pub line_offsets: Vec<usize>,
}

impl WrapResult {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 第一个起始偏移 `>= offset` 的行，找不到时返回最后一行
    ///
    /// 结果为空时返回 `None`。
    pub fn line_for_offset(&self, offset: usize) -> Option<usize> {
        if self.line_offsets.is_empty() {
            return None;
        }
        let index = self.line_offsets.partition_point(|&start| start < offset);
        Some(index.min(self.line_offsets.len() - 1))
    }

    /// 包含 `offset` 的行：最后一个起始偏移 `<= offset` 的行
    pub fn line_containing(&self, offset: usize) -> Option<usize> {
        if self.line_offsets.is_empty() {
            return None;
        }
        let index = self.line_offsets.partition_point(|&start| start <= offset);
        Some(index.saturating_sub(1))
    }
}

/// 码点的显示宽度，双宽字符（如中日韩文字）占两列
pub fn display_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

/// 使用Unicode显示宽度折行
pub fn wrap(text: &str, width: usize) -> WrapResult {
    wrap_with(text, width, display_width)
}

/// 使用自定义的显示宽度函数折行
///
/// 宽度函数返回0的码点按宽度1处理。`width` 为0时返回空结果。
pub fn wrap_with<F>(text: &str, width: usize, char_width: F) -> WrapResult
where
    F: Fn(char) -> usize,
{
    let mut result = WrapResult::default();
    if width == 0 || text.is_empty() {
        return result;
    }

    let mut line = String::new();
    let mut col = 0;
    let mut line_start = 0;
    let mut offset = 0;

    for ch in text.chars() {
        if ch == '\n' {
            result.lines.push(std::mem::take(&mut line));
            result.line_offsets.push(line_start);
            col = 0;
            offset += 1;
            line_start = offset;
            continue;
        }

        let w = char_width(ch).max(1);
        if col > 0 && col + w > width {
            result.lines.push(std::mem::take(&mut line));
            result.line_offsets.push(line_start);
            col = 0;
            line_start = offset;
        }

        line.push(ch);
        col += w;
        offset += 1;
    }

    if !line.is_empty() {
        result.lines.push(line);
        result.line_offsets.push(line_start);
    }

    result
}
