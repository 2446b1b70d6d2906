//! 导航文档解析模块
//!
//! 支持EPUB3的XHTML导航文档（`<nav epub:type="toc">`）和EPUB2的NCX文件，
//! 两者都解析成同一种导航点树，再按文档顺序平铺成带深度的列表。

mod ncx;
mod xhtml;

pub use ncx::parse_ncx;
pub use xhtml::parse_nav_document;

/// 导航点
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavPoint {
    /// 导航标签
    pub label: String,
    /// 目标链接（相对于导航文档，未解码）
    pub href: Option<String>,
    /// NCX的playOrder
    pub play_order: Option<u32>,
    /// 子导航点
    pub children: Vec<NavPoint>,
}

impl NavPoint {
    pub fn new(label: impl Into<String>, href: Option<String>) -> Self {
        Self {
            label: label.into(),
            href,
            play_order: None,
            children: Vec::new(),
        }
    }

    /// 按playOrder排序子导航点，没有playOrder的保持原有相对顺序
    pub fn sort_children_by_play_order(&mut self) {
        sort_by_play_order(&mut self.children);
    }
}

/// 平铺后的导航条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub label: String,
    pub href: String,
    /// 嵌套深度，顶层为0
    pub depth: usize,
}

/// 递归地按playOrder排序
pub fn sort_by_play_order(points: &mut [NavPoint]) {
    // sort_by_key是稳定排序
    points.sort_by_key(|point| point.play_order.unwrap_or(u32::MAX));
    for point in points.iter_mut() {
        point.sort_children_by_play_order();
    }
}

/// 先序遍历平铺导航点树
///
/// 没有链接的导航点本身被跳过，但其子节点保留原有深度。
pub fn flatten(points: &[NavPoint]) -> Vec<NavEntry> {
    fn visit(points: &[NavPoint], depth: usize, out: &mut Vec<NavEntry>) {
        for point in points {
            if let Some(href) = point.href.as_deref().filter(|href| !href.trim().is_empty()) {
                out.push(NavEntry {
                    label: point.label.clone(),
                    href: href.to_string(),
                    depth,
                });
            }
            visit(&point.children, depth + 1, out);
        }
    }

    let mut entries = Vec::new();
    visit(points, 0, &mut entries);
    entries
}
