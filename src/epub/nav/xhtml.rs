//! EPUB3 XHTML导航文档解析
//!
//! 导航文档本身是普通的XHTML，使用scraper容错解析后查找目录 `nav` 元素，
//! 其中嵌套的 `ol/li/a` 构成导航树。

use super::NavPoint;
use crate::markup::collapse_whitespace;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static NAV_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("nav").ok());

/// 解析导航文档，返回目录导航点树
///
/// 优先选择 `epub:type="toc"`（或 `role="doc-toc"`）的nav元素，
/// 否则使用第一个包含列表的nav元素。没有可用的nav时返回空列表。
pub fn parse_nav_document(html: &str) -> Vec<NavPoint> {
    let document = Html::parse_document(html);
    let Some(selector) = NAV_SELECTOR.as_ref() else {
        return Vec::new();
    };

    let navs: Vec<ElementRef<'_>> = document.select(selector).collect();
    let toc_nav = navs
        .iter()
        .find(|nav| is_toc_nav(nav))
        .or_else(|| navs.iter().find(|nav| child_element(**nav, "ol").is_some()));

    toc_nav
        .and_then(|nav| child_element(*nav, "ol"))
        .map(parse_list)
        .unwrap_or_default()
}

fn is_toc_nav(nav: &ElementRef<'_>) -> bool {
    let element = nav.value();
    let has_toc = |value: Option<&str>| {
        value.is_some_and(|value| value.split_whitespace().any(|token| token == "toc" || token == "doc-toc"))
    };
    has_toc(element.attr("epub:type")) || has_toc(element.attr("type")) || has_toc(element.attr("role"))
}

/// 第一个指定名称的直接子元素
fn child_element<'a>(parent: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == name)
}

fn parse_list(list: ElementRef<'_>) -> Vec<NavPoint> {
    list.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li")
        .filter_map(parse_item)
        .collect()
}

/// 解析一个li：链接或span作为标签，嵌套的ol作为子节点
fn parse_item(item: ElementRef<'_>) -> Option<NavPoint> {
    let heading = child_element(item, "a").or_else(|| child_element(item, "span"));
    let children = child_element(item, "ol").map(parse_list).unwrap_or_default();

    let (label, href) = match heading {
        Some(heading) => (
            collapse_whitespace(&heading.text().collect::<String>()),
            heading.value().attr("href").map(str::to_string),
        ),
        None => (String::new(), None),
    };

    if href.is_none() && children.is_empty() {
        return None;
    }

    Some(NavPoint {
        label,
        href,
        play_order: None,
        children,
    })
}
