//! bookweave：电子书规范化与导航引擎
//!
//! 把EPUB与FB2文档统一加载为一段线性文本加章节索引，在此之上提供
//! 位置换算、按终端宽度折行、字面搜索以及目录与书签跳转。

pub mod book;
pub mod config;
pub mod epub;
pub mod error;
pub mod fb2;
pub mod markup;
pub mod position;
pub mod reader;
pub mod search;
pub mod viewport;
pub mod wrap;

#[cfg(test)]
mod testutil;

// === 核心API重新导出 ===

/// 统一读取入口
pub use reader::{UnifiedReader, sniff_format};

/// 错误处理
pub use error::{ReaderError, Result};

/// 配置
pub use config::{ConfigError, ReaderConfig};

// === 数据结构 ===

pub use book::{Book, BookFormat, BookId, Bookmark, Chapter, LoadedBook, Locatable, Position, TocEntry};

// === 导航 ===

pub use position::{
    chapter_label, clamp_position, offset_to_position, position_to_offset, progress_percent, resolve_bookmark,
};
pub use search::{SearchEngine, SearchOutcome};
pub use viewport::Viewport;
pub use wrap::{WrapResult, display_width, wrap, wrap_with};

// === 库信息 ===

/// bookweave库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// bookweave库的描述
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

// === 便捷函数 ===

/// 使用默认配置打开一本书
///
/// 这是 `UnifiedReader::new().open(path)` 的便捷包装函数。
///
/// # 参数
/// * `path` - EPUB或FB2文件路径
///
/// # 返回值
/// * `Result<LoadedBook>` - 加载完成的书籍
///
/// # 示例
///
/// ```no_run
/// let loaded = bookweave::open("book.epub")?;
/// println!("书名: {}", loaded.book.title);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<LoadedBook> {
    UnifiedReader::new().open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        println!("bookweave version: {}", VERSION);
    }

    #[test]
    fn test_description() {
        assert!(!DESCRIPTION.is_empty());
        println!("Description: {}", DESCRIPTION);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(open("no-such-book.fb2"), Err(ReaderError::FileNotFound(_))));
    }
}
