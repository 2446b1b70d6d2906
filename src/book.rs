//! 书籍数据模型
//!
//! 定义所有加载器共同产出的统一内存表示：书籍、章节、位置、目录项和书签。
//! 所有偏移量与长度都以Unicode码点计数，而不是字节。

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::path::Path;

/// 书籍的稳定标识符
///
/// 由文档自身的唯一标识符或源文件路径确定性地派生，与加载顺序无关，
/// 可以跨会话作为书签的键使用。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookId(String);

impl BookId {
    /// 直接使用已有的标识符字符串
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 从文档标识符（EPUB的dc:identifier、FB2的document-info/id）派生
    pub fn from_identifier(identifier: &str) -> Self {
        Self::derive("id", identifier.trim())
    }

    /// 从源文件路径派生
    ///
    /// 优先使用规范化后的绝对路径，规范化失败时退回原始路径。
    pub fn from_path(path: &Path) -> Self {
        let resolved = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        Self::derive("path", &resolved.to_string_lossy())
    }

    fn derive(kind: &str, value: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(format!("{}:{}", kind, value).as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..16].to_string())
    }

    /// 获取标识符文本
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 书籍内的逻辑位置（以章节为参照）
///
/// 只有和某一本具体的书放在一起才有意义。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// 章节索引
    pub chapter_index: usize,
    /// 章节内偏移（码点）
    pub offset_in_chapter: usize,
}

impl Position {
    pub fn new(chapter_index: usize, offset_in_chapter: usize) -> Self {
        Self {
            chapter_index,
            offset_in_chapter,
        }
    }
}

/// 章节：线性文本流中一段连续、互不重叠的区间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 章节索引
    pub index: usize,
    /// 章节标题
    pub title: String,
    /// 在线性文本中的起始偏移
    pub offset: usize,
    /// 章节长度（码点）
    pub length: usize,
}

impl Chapter {
    /// 章节结束偏移（不含）
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// 书籍元数据与章节索引
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub chapters: Vec<Chapter>,
    /// 线性文本的总码点数
    pub total_characters: usize,
}

impl Book {
    /// 根据索引获取章节
    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    /// 检查章节是否连续且与总长度一致
    pub fn is_consistent(&self) -> bool {
        let mut cursor = 0;
        for (i, chapter) in self.chapters.iter().enumerate() {
            if chapter.index != i || chapter.offset != cursor {
                return false;
            }
            cursor = chapter.end();
        }
        cursor == self.total_characters
    }
}

/// 书籍的源格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookFormat {
    /// EPUB压缩包
    Epub,
    /// FB2单一XML文档
    Fb2,
    /// 压缩在ZIP中的FB2文档
    Fb2Zip,
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookFormat::Epub => f.write_str("EPUB"),
            BookFormat::Fb2 => f.write_str("FB2"),
            BookFormat::Fb2Zip => f.write_str("FB2 (zip)"),
        }
    }
}

/// 可以给出书内位置的对象
pub trait Locatable {
    fn position(&self) -> Position;
}

/// 目录项，加载时生成，之后不再变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// 显示标签（按嵌套深度缩进）
    pub label: String,
    pub book_id: BookId,
    pub pos: Position,
    /// 嵌套深度，顶层为0
    pub depth: usize,
}

impl TocEntry {
    /// 创建目录项，标签按深度每层缩进两个空格
    pub fn indented(label: &str, book_id: BookId, pos: Position, depth: usize) -> Self {
        Self {
            label: format!("{}{}", "  ".repeat(depth), label.trim()),
            book_id,
            pos,
            depth,
        }
    }
}

impl Locatable for TocEntry {
    fn position(&self) -> Position {
        self.pos
    }
}

/// 书签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub name: String,
    pub book_id: BookId,
    pub pos: Position,
}

impl Bookmark {
    pub fn new(name: impl Into<String>, book_id: BookId, pos: Position) -> Self {
        Self {
            name: name.into(),
            book_id,
            pos,
        }
    }
}

impl Locatable for Bookmark {
    fn position(&self) -> Position {
        self.pos
    }
}

/// 加载完成的书籍：拥有完整的线性文本
///
/// `book.chapters` 只是指向 `text` 的只读索引，目录项也只是偏移视图。
#[derive(Debug, Clone)]
pub struct LoadedBook {
    pub book: Book,
    pub text: String,
    pub toc: Vec<TocEntry>,
    /// 源格式
    pub format: BookFormat,
    /// 加载过程中被占位替换的内容单元说明
    pub diagnostics: Vec<String>,
}

impl LoadedBook {
    /// 获取某一章节的文本切片
    pub fn chapter_text(&self, index: usize) -> Option<&str> {
        let chapter = self.book.chapter(index)?;
        let start = byte_offset(&self.text, chapter.offset);
        let end = byte_offset(&self.text, chapter.end());
        self.text.get(start..end)
    }
}

/// 把码点偏移换算成字节偏移，超出末尾时返回文本长度
pub(crate) fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// 线性文本构建器
///
/// 两种加载器都通过它追加章节，保证偏移与长度的记账方式完全一致。
#[derive(Debug, Default)]
pub(crate) struct LinearTextBuilder {
    text: String,
    chapters: Vec<Chapter>,
    cursor: usize,
}

impl LinearTextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个章节，返回其索引
    pub fn push_chapter(&mut self, title: String, body: &str) -> usize {
        let index = self.chapters.len();
        let length = body.chars().count();
        self.text.push_str(body);
        self.chapters.push(Chapter {
            index,
            title,
            offset: self.cursor,
            length,
        });
        self.cursor += length;
        index
    }

    /// 修改已追加章节的标题
    pub fn set_title(&mut self, index: usize, title: String) {
        if let Some(chapter) = self.chapters.get_mut(index) {
            chapter.title = title;
        }
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// 结束构建，返回(线性文本, 章节列表, 总码点数)
    pub fn finish(self) -> (String, Vec<Chapter>, usize) {
        (self.text, self.chapters, self.cursor)
    }
}
