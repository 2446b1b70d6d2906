//! 脊柱模块
//!
//! 提供EPUB包中阅读顺序（脊柱）的结构定义。

/// 脊柱项信息(阅读顺序)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// 引用的清单项ID
    pub idref: String,
    /// 是否线性阅读，`linear="no"` 的项不进入阅读顺序
    pub linear: bool,
}

impl SpineItem {
    pub fn new(idref: String, linear: bool) -> Self {
        Self { idref, linear }
    }
}
