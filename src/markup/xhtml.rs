//! XHTML内容文档的规范化
//!
//! 使用scraper解析（容错的HTML5解析），遍历body元素提取段落文本。

use super::{MarkupError, NormalizedUnit, ParagraphCollector, collapse_whitespace};
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use std::collections::{HashMap, HashSet};

/// 结束当前段落的块级元素
static BLOCK_TAGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "dl", "dt", "dd",
        "blockquote", "pre", "table", "tr", "caption", "section", "article", "aside", "header",
        "footer", "nav", "figure", "figcaption", "hr", "address", "main", "center",
    ]
    .into_iter()
    .collect()
});

/// 用占位文本替换的媒体元素
static MEDIA_TAGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "img", "image", "svg", "video", "audio", "object", "embed", "iframe", "canvas", "picture",
    ]
    .into_iter()
    .collect()
});

/// 内容完全跳过的元素
static SKIPPED_TAGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["head", "script", "style", "template", "noscript", "title"]
        .into_iter()
        .collect()
});

/// 规范化一个XHTML内容文档
///
/// # 参数
/// * `unit` - 内容单元标识（用于错误信息）
/// * `bytes` - 文档原始字节
/// * `placeholder` - 媒体占位文本
///
/// # 返回值
/// * `Result<NormalizedUnit, MarkupError>` - 字节无法解码为文本时返回错误
pub fn normalize_xhtml(
    unit: &str,
    bytes: &[u8],
    placeholder: &str,
) -> Result<NormalizedUnit, MarkupError> {
    let source = decode(unit, bytes)?;
    let document = Html::parse_document(&source);
    let root = document.root_element();

    let head_title = find_element(root, "title")
        .map(|title| collapse_whitespace(&title.text().collect::<String>()))
        .filter(|title| !title.is_empty());

    let Some(body) = find_element(root, "body") else {
        return Ok(NormalizedUnit {
            title: head_title,
            ..NormalizedUnit::default()
        });
    };

    let mut walker = Walker {
        collector: ParagraphCollector::new(placeholder),
        anchors: HashMap::new(),
        heading: None,
    };
    walker.walk(body);

    Ok(NormalizedUnit {
        title: walker.heading.or(head_title),
        paragraphs: walker.collector.finish(),
        anchors: walker.anchors,
    })
}

/// 解码文档字节：有BOM时按BOM指示的编码，否则必须是UTF-8
fn decode(unit: &str, bytes: &[u8]) -> Result<String, MarkupError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if had_errors {
            return Err(MarkupError::new(
                unit,
                format!("{}编码的内容包含无效字节", encoding.name()),
            ));
        }
        return Ok(text.into_owned());
    }

    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| MarkupError::new(unit, format!("不是有效的UTF-8文本: {}", e)))
}

fn find_element<'a>(root: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == name)
}

struct Walker {
    collector: ParagraphCollector,
    anchors: HashMap<String, usize>,
    heading: Option<String>,
}

impl Walker {
    fn walk(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();

        if SKIPPED_TAGS.contains(name) {
            return;
        }

        if MEDIA_TAGS.contains(name) {
            self.record_anchor(element);
            self.collector.push_placeholder();
            return;
        }

        if name == "br" {
            self.collector.break_paragraph();
            return;
        }

        let block = BLOCK_TAGS.contains(name);
        if block {
            self.collector.break_paragraph();
        }
        self.record_anchor(element);

        if self.heading.is_none() && matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
            let text = collapse_whitespace(&element.text().collect::<String>());
            if !text.is_empty() {
                self.heading = Some(text);
            }
        }

        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    self.collector.push_text(text);
                }
                Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        self.walk(child_element);
                    }
                }
                _ => {}
            }
        }

        if block {
            self.collector.break_paragraph();
        }
    }

    /// 记录元素上的id（以及a元素的name）锚点
    fn record_anchor(&mut self, element: ElementRef<'_>) {
        let value = element.value();
        let index = self.collector.paragraph_index();

        if let Some(id) = value.id() {
            self.anchors.entry(id.to_string()).or_insert(index);
        }
        if value.name() == "a" {
            if let Some(name) = value.attr("name") {
                self.anchors.entry(name.to_string()).or_insert(index);
            }
        }
    }
}
