//! 视口导航
//!
//! 持有一本已加载的书和针对当前宽度的折行结果，负责滚动、翻页、目录与书签跳转、
//! 搜索定位以及状态栏位置信息。当前位置总是由顶部行的起始偏移推导出来。

use crate::book::{Bookmark, LoadedBook, Locatable, Position};
use crate::config::ReaderConfig;
use crate::position::{
    chapter_label, offset_to_position, position_to_offset, progress_percent, resolve_bookmark,
};
use crate::search::{SearchEngine, SearchOutcome};
use crate::wrap::{WrapResult, wrap};
use log::{debug, trace};

/// 阅读视口
#[derive(Debug)]
pub struct Viewport {
    loaded: LoadedBook,
    config: ReaderConfig,
    wrapped: WrapResult,
    width: usize,
    height: usize,
    top_line: usize,
    current: Position,
    search: SearchEngine,
    bookmarks: Vec<Bookmark>,
}

impl Viewport {
    /// 创建新的视口
    ///
    /// # 参数
    /// * `loaded` - 已加载的书
    /// * `config` - 引擎配置
    /// * `width` - 可用列宽
    /// * `height` - 可见行数（至少按1行处理）
    pub fn new(loaded: LoadedBook, config: ReaderConfig, width: usize, height: usize) -> Self {
        let wrapped = wrap(&loaded.text, width);
        let mut viewport = Self {
            loaded,
            config,
            wrapped,
            width,
            height: height.max(1),
            top_line: 0,
            current: Position::default(),
            search: SearchEngine::new(),
            bookmarks: Vec::new(),
        };
        viewport.sync_current();
        viewport
    }

    pub fn book(&self) -> &LoadedBook {
        &self.loaded
    }

    pub fn wrapped(&self) -> &WrapResult {
        &self.wrapped
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn top_line(&self) -> usize {
        self.top_line
    }

    /// 当前位置（顶部行的起点）
    pub fn current(&self) -> Position {
        self.current
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    /// 改变视口尺寸
    ///
    /// 宽度变化时重新折行，并让包含原当前偏移的行成为新的顶部行。
    pub fn resize(&mut self, width: usize, height: usize) {
        self.height = height.max(1);
        if width == self.width {
            return;
        }

        let anchor = position_to_offset(&self.loaded.book, self.current);
        self.width = width;
        self.wrapped = wrap(&self.loaded.text, width);
        self.top_line = self.wrapped.line_containing(anchor).unwrap_or(0);
        self.sync_current();
        debug!(
            "视口宽度调整为 {}，共 {} 行，顶部行 {}",
            width,
            self.wrapped.len(),
            self.top_line
        );
    }

    /// 跳转到指定位置
    ///
    /// 第一个起始偏移不小于目标偏移的行成为顶部行（没有时取最后一行），
    /// 返回由该行起点重新推导出的当前位置。
    pub fn jump_to(&mut self, pos: Position) -> Position {
        let target = position_to_offset(&self.loaded.book, pos);
        if let Some(line) = self.wrapped.line_for_offset(target) {
            self.top_line = line;
            self.sync_current();
        }
        trace!("跳转到偏移 {}，顶部行 {}", target, self.top_line);
        self.current
    }

    /// 跳转到任意可定位对象
    pub fn jump_to_target<T: Locatable>(&mut self, target: &T) -> Position {
        self.jump_to(target.position())
    }

    /// 跳转到第 `index` 个目录项，索引越界时返回 `None`
    pub fn jump_to_toc(&mut self, index: usize) -> Option<Position> {
        let pos = self.loaded.toc.get(index)?.pos;
        Some(self.jump_to(pos))
    }

    /// 跳转到书签，书签属于其他书籍时返回 `None`
    pub fn jump_to_bookmark(&mut self, bookmark: &Bookmark) -> Option<Position> {
        let pos = resolve_bookmark(&self.loaded.book, bookmark)?;
        Some(self.jump_to(pos))
    }

    pub fn scroll_up(&mut self) {
        self.set_top_line(self.top_line.saturating_sub(1));
    }

    pub fn scroll_down(&mut self) {
        self.set_top_line(self.top_line + 1);
    }

    pub fn page_up(&mut self) {
        self.set_top_line(self.top_line.saturating_sub(self.height));
    }

    pub fn page_down(&mut self) {
        self.set_top_line(self.top_line + self.height);
    }

    pub fn home(&mut self) {
        self.set_top_line(0);
    }

    pub fn end(&mut self) {
        self.set_top_line(self.max_top_line());
    }

    /// 当前可见的行
    pub fn visible_lines(&self) -> &[String] {
        let lines = &self.wrapped.lines;
        let start = self.top_line.min(lines.len());
        let end = (start + self.height).min(lines.len());
        &lines[start..end]
    }

    /// 搜索并在找到时跳转到匹配所在的行
    pub fn search(&mut self, term: &str, reset: bool) -> SearchOutcome {
        let outcome = self.search.search(Some(&self.loaded), term, reset);
        if let SearchOutcome::Found { position, .. } = outcome {
            self.jump_to(position);
        }
        outcome
    }

    /// 查找上一次搜索词的下一个匹配
    pub fn search_next(&mut self) -> SearchOutcome {
        match self.search.last_term().map(str::to_string) {
            Some(term) => self.search(&term, false),
            None => SearchOutcome::EmptyTerm,
        }
    }

    /// 在当前位置添加书签
    ///
    /// 没有给出名称时命名为"<bookmark_label> N"，N为添加后的书签数量。
    pub fn new_bookmark(&mut self, name: Option<&str>) -> &Bookmark {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("{} {}", self.config.bookmark_label, self.bookmarks.len() + 1),
        };
        let bookmark = Bookmark::new(name, self.loaded.book.id.clone(), self.current);
        let index = self.bookmarks.len();
        self.bookmarks.push(bookmark);
        &self.bookmarks[index]
    }

    /// 删除书签，返回被删除的书签
    pub fn remove_bookmark(&mut self, index: usize) -> Option<Bookmark> {
        (index < self.bookmarks.len()).then(|| self.bookmarks.remove(index))
    }

    /// 阅读进度百分比
    pub fn progress(&self) -> usize {
        progress_percent(&self.loaded.book, self.current)
    }

    /// 状态栏位置信息："<章节名> <百分比>%"，没有章节时为空
    pub fn status_location(&self) -> String {
        let book = &self.loaded.book;
        if book.chapters.is_empty() || book.total_characters == 0 {
            return String::new();
        }
        let label = chapter_label(book, self.current.chapter_index, &self.config);
        if label.is_empty() {
            format!("{}%", self.progress())
        } else {
            format!("{} {}%", label, self.progress())
        }
    }

    fn max_top_line(&self) -> usize {
        self.wrapped.len().saturating_sub(1)
    }

    fn set_top_line(&mut self, line: usize) {
        let line = line.min(self.max_top_line());
        if line != self.top_line {
            self.top_line = line;
            self.sync_current();
        }
    }

    /// 根据顶部行重新推导当前位置
    fn sync_current(&mut self) {
        self.current = match self.wrapped.line_offsets.get(self.top_line) {
            Some(&start) => offset_to_position(&self.loaded.book, start),
            None => Position::default(),
        };
    }
}
