//! 位置模型
//!
//! 章节相对位置与线性文本绝对偏移之间的换算。全部是针对不可变 `Book` 的纯函数，
//! 状态栏、搜索和跳转可以随意调用，不需要任何协调。

use crate::book::{Book, Bookmark, Position};
use crate::config::ReaderConfig;

/// 把位置换算为线性文本中的绝对偏移
///
/// 章节内偏移被限制在 `[0, chapter.length]`；章节索引越界时（例如来自过期或
/// 其他书籍的书签）返回0而不是报错。
pub fn position_to_offset(book: &Book, pos: Position) -> usize {
    match book.chapter(pos.chapter_index) {
        Some(chapter) => chapter.offset + pos.offset_in_chapter.min(chapter.length),
        None => 0,
    }
}

/// 把绝对偏移换算为位置
///
/// 返回满足 `chapter.offset <= offset < chapter.offset + chapter.length` 的唯一章节；
/// 恰好位于书末的偏移归入最后一章。偏移为0或书为空时返回零位置，超出书末的偏移
/// 被限制到书末。
pub fn offset_to_position(book: &Book, offset: usize) -> Position {
    let chapters = &book.chapters;
    if offset == 0 || chapters.is_empty() {
        return Position::default();
    }

    let offset = offset.min(book.total_characters);
    // 第一个结束位置大于offset的章节
    let index = chapters.partition_point(|chapter| chapter.end() <= offset);
    if index >= chapters.len() {
        let last = chapters.len() - 1;
        return Position::new(last, offset.saturating_sub(chapters[last].offset));
    }

    Position::new(index, offset - chapters[index].offset)
}

/// 把位置限制到书中的合法范围内
pub fn clamp_position(book: &Book, pos: Position) -> Position {
    match book.chapter(pos.chapter_index) {
        Some(chapter) => Position::new(pos.chapter_index, pos.offset_in_chapter.min(chapter.length)),
        None => Position::default(),
    }
}

/// 校验并解析书签
///
/// 书签属于其他书籍时返回 `None`；否则返回限制到合法范围内的位置。
pub fn resolve_bookmark(book: &Book, bookmark: &Bookmark) -> Option<Position> {
    if bookmark.book_id != book.id {
        return None;
    }
    Some(clamp_position(book, bookmark.pos))
}

/// 阅读进度百分比（0-100）
pub fn progress_percent(book: &Book, pos: Position) -> usize {
    if book.total_characters == 0 {
        return 0;
    }
    let offset = position_to_offset(book, pos).min(book.total_characters);
    offset * 100 / book.total_characters
}

/// 章节的显示名称，标题为空时使用"<chapter_label> N"
pub fn chapter_label(book: &Book, chapter_index: usize, config: &ReaderConfig) -> String {
    match book.chapter(chapter_index) {
        Some(chapter) if !chapter.title.trim().is_empty() => chapter.title.clone(),
        Some(_) => format!("{} {}", config.chapter_label, chapter_index + 1),
        None => String::new(),
    }
}
