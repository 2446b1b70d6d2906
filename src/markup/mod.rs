//! 标记规范化模块
//!
//! 把单个内容单元（EPUB的XHTML文档或FB2的section）去除标记后整理成段落文本。
//! 段落内的空白折叠为单个空格，段落之间以单个 `\n` 分隔，
//! 图片等非文本媒体替换为固定的占位文本，以保证偏移连续。

mod xhtml;

use std::collections::HashMap;
use thiserror::Error;

pub use xhtml::normalize_xhtml;

/// 单个内容单元规范化失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("内容单元 {unit} 无法规范化: {reason}")]
pub struct MarkupError {
    /// 出错的内容单元标识
    pub unit: String,
    /// 失败原因
    pub reason: String,
}

impl MarkupError {
    pub fn new(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            reason: reason.into(),
        }
    }
}

/// 规范化后的内容单元
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedUnit {
    /// 单元标题（如果有）
    pub title: Option<String>,
    /// 段落列表
    pub paragraphs: Vec<String>,
    /// 锚点ID -> 包含或紧随该锚点的段落索引
    pub anchors: HashMap<String, usize>,
}

impl NormalizedUnit {
    /// 生成该单元在线性文本中的章节正文
    ///
    /// 段落以 `\n` 连接，非空时末尾再追加一个 `\n`。
    pub fn text(&self) -> String {
        paragraphs_text(&self.paragraphs)
    }

    /// 第 `index` 个段落在章节正文中的起始偏移（码点）
    pub fn paragraph_offset(&self, index: usize) -> usize {
        self.paragraphs
            .iter()
            .take(index)
            .map(|p| p.chars().count() + 1)
            .sum()
    }

    /// 锚点在章节正文中的偏移
    ///
    /// 锚点不在段落边界上时取其所在段落的起点，因此不会越过目标段落。
    pub fn anchor_offset(&self, id: &str) -> Option<usize> {
        self.anchors
            .get(id)
            .map(|&index| self.paragraph_offset(index.min(self.paragraphs.len())))
    }
}

/// 段落收集器
///
/// 两种格式的遍历器都把文本、段落边界和媒体占位送进这里。
#[derive(Debug)]
pub struct ParagraphCollector {
    paragraphs: Vec<String>,
    current: String,
    pending_space: bool,
    placeholder: String,
}

impl ParagraphCollector {
    pub fn new(placeholder: &str) -> Self {
        Self {
            paragraphs: Vec::new(),
            current: String::new(),
            pending_space: false,
            placeholder: placeholder.to_string(),
        }
    }

    /// 追加行内文本，连续空白折叠为一个空格
    pub fn push_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.current.is_empty() {
                    self.pending_space = true;
                }
            } else {
                if self.pending_space {
                    self.current.push(' ');
                    self.pending_space = false;
                }
                self.current.push(ch);
            }
        }
    }

    /// 追加媒体占位文本，作为独立的词出现在当前段落中
    pub fn push_placeholder(&mut self) {
        if !self.current.is_empty() {
            self.current.push(' ');
        }
        self.current.push_str(&self.placeholder);
        self.pending_space = true;
    }

    /// 结束当前段落（空段落被丢弃）
    pub fn break_paragraph(&mut self) {
        if !self.current.is_empty() {
            self.paragraphs.push(std::mem::take(&mut self.current));
        }
        self.pending_space = false;
    }

    /// 插入一个空行段落，开头和连续的空行会被合并
    pub fn blank_line(&mut self) {
        self.break_paragraph();
        if self.paragraphs.last().is_some_and(|p| !p.is_empty()) {
            self.paragraphs.push(String::new());
        }
    }

    /// 当前或下一个段落的索引
    pub fn paragraph_index(&self) -> usize {
        self.paragraphs.len()
    }

    /// 从 `start` 开始已经结束的段落
    pub fn paragraphs_from(&self, start: usize) -> &[String] {
        self.paragraphs.get(start..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty() && self.current.is_empty()
    }

    /// 结束收集，去掉末尾的空行
    pub fn finish(mut self) -> Vec<String> {
        self.break_paragraph();
        while self.paragraphs.last().is_some_and(|p| p.is_empty()) {
            self.paragraphs.pop();
        }
        self.paragraphs
    }
}

/// 把段落拼成章节正文：以 `\n` 连接，非空时末尾再追加一个 `\n`
pub fn paragraphs_text(paragraphs: &[String]) -> String {
    if paragraphs.is_empty() {
        return String::new();
    }
    let mut text = paragraphs.join("\n");
    text.push('\n');
    text
}

/// 把一段文本的空白折叠为单个空格并去掉首尾空白
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_collapses_whitespace() {
        let mut collector = ParagraphCollector::new("[image]");
        collector.push_text("  Hello,\n\t  ");
        collector.push_text("world  ");
        collector.break_paragraph();
        collector.push_text("second");
        assert_eq!(collector.finish(), vec!["Hello, world", "second"]);
    }

    #[test]
    fn test_placeholder_is_kept_inline() {
        let mut collector = ParagraphCollector::new("[image]");
        collector.push_text("before");
        collector.push_placeholder();
        collector.push_text("after");
        collector.break_paragraph();
        collector.push_placeholder();
        assert_eq!(collector.finish(), vec!["before [image] after", "[image]"]);
    }

    #[test]
    fn test_blank_lines_are_merged_and_trimmed() {
        let mut collector = ParagraphCollector::new("[image]");
        collector.blank_line();
        collector.push_text("a");
        collector.blank_line();
        collector.blank_line();
        collector.push_text("b");
        collector.blank_line();
        assert_eq!(collector.finish(), vec!["a", "", "b"]);
    }

    #[test]
    fn test_unit_text_and_anchor_offsets() {
        let mut unit = NormalizedUnit {
            title: None,
            paragraphs: vec!["abc".to_string(), "de".to_string()],
            anchors: HashMap::new(),
        };
        unit.anchors.insert("second".to_string(), 1);
        unit.anchors.insert("tail".to_string(), 9);

        assert_eq!(unit.text(), "abc\nde\n");
        assert_eq!(unit.anchor_offset("second"), Some(4));
        assert_eq!(unit.anchor_offset("tail"), Some(7));
        assert_eq!(unit.anchor_offset("missing"), None);
        assert_eq!(NormalizedUnit::default().text(), "");
    }
}
