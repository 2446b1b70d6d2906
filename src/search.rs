//! 搜索引擎
//!
//! 在线性文本（而不是折行后的视图）上做区分大小写的字面子串前向搜索，
//! 记住上一次的搜索词和匹配位置以支持"查找下一个"。到达文本末尾后不会回绕。

use crate::book::{BookId, LoadedBook, Position};
use crate::position::offset_to_position;
use std::fmt;

/// 一次搜索的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// 搜索词为空或没有打开的书
    EmptyTerm,
    /// 找到匹配
    Found {
        /// 匹配起始的绝对偏移（码点）
        offset: usize,
        /// 匹配起始对应的位置
        position: Position,
    },
    /// 从未找到过匹配
    NoMatches,
    /// 之前有过匹配，但后面没有更多了
    NoMoreMatches,
}

impl SearchOutcome {
    /// 匹配到的位置
    pub fn position(&self) -> Option<Position> {
        match self {
            SearchOutcome::Found { position, .. } => Some(*position),
            _ => None,
        }
    }
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchOutcome::EmptyTerm => f.write_str("查找: 搜索词为空"),
            SearchOutcome::Found { .. } => f.write_str("查找: 找到匹配"),
            SearchOutcome::NoMatches => f.write_str("查找: 没有匹配"),
            SearchOutcome::NoMoreMatches => f.write_str("查找: 没有更多匹配"),
        }
    }
}

/// 上一次匹配
///
/// 字节偏移只对产生它的那本书有效，因此同时记下书籍ID和总长度。
#[derive(Debug, Clone, PartialEq, Eq)]
struct LastMatch {
    book_id: BookId,
    total_characters: usize,
    /// 码点偏移
    offset: usize,
    /// 字节偏移，用于从匹配处继续扫描
    byte: usize,
}

impl LastMatch {
    fn belongs_to(&self, loaded: &LoadedBook) -> bool {
        self.book_id == loaded.book.id && self.total_characters == loaded.book.total_characters
    }
}

/// 有状态的搜索引擎
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    last_term: Option<String>,
    last_match: Option<LastMatch>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 上一次使用的搜索词
    pub fn last_term(&self) -> Option<&str> {
        self.last_term.as_deref()
    }

    /// 上一次匹配的起始偏移
    pub fn last_match_offset(&self) -> Option<usize> {
        self.last_match.as_ref().map(|m| m.offset)
    }

    /// 清除全部状态（例如打开新书时）
    pub fn clear(&mut self) {
        self.last_term = None;
        self.last_match = None;
    }

    /// 执行一次搜索
    ///
    /// # 参数
    /// * `book` - 当前打开的书
    /// * `term` - 搜索词
    /// * `reset` - 是否从头开始搜索
    ///
    /// # 返回值
    /// * `SearchOutcome` - 成功时状态更新为本次匹配，否则状态保持不变
    pub fn search(&mut self, book: Option<&LoadedBook>, term: &str, reset: bool) -> SearchOutcome {
        let Some(loaded) = book else {
            return SearchOutcome::EmptyTerm;
        };
        if term.is_empty() {
            return SearchOutcome::EmptyTerm;
        }

        if reset || self.last_term.as_deref() != Some(term) {
            self.last_term = Some(term.to_string());
            self.last_match = None;
        }
        // 换了书，上一次的匹配不再有意义
        if self.last_match.as_ref().is_some_and(|last| !last.belongs_to(loaded)) {
            self.last_match = None;
        }

        let exhausted = if self.last_match.is_some() {
            SearchOutcome::NoMoreMatches
        } else {
            SearchOutcome::NoMatches
        };

        let text = loaded.text.as_str();
        let (start_offset, start_byte) = match &self.last_match {
            Some(last) => {
                if last.offset + 1 >= loaded.book.total_characters {
                    return exhausted;
                }
                let Some(rest) = text.get(last.byte..) else {
                    return exhausted;
                };
                let step = rest.chars().next().map_or(0, char::len_utf8);
                (last.offset + 1, last.byte + step)
            }
            None => (0, 0),
        };

        if start_offset >= loaded.book.total_characters {
            return exhausted;
        }
        let Some(rest) = text.get(start_byte..) else {
            return exhausted;
        };
        let Some(found) = rest.find(term) else {
            return exhausted;
        };

        let byte = start_byte + found;
        let offset = start_offset + rest[..found].chars().count();
        self.last_match = Some(LastMatch {
            book_id: loaded.book.id.clone(),
            total_characters: loaded.book.total_characters,
            offset,
            byte,
        });

        SearchOutcome::Found {
            offset,
            position: offset_to_position(&loaded.book, offset),
        }
    }
}
