//! NCX（Navigation Control file for XML）解析

use super::{NavPoint, sort_by_play_order};
use crate::epub::error::Result;
use crate::epub::xml::attribute_text;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// 解析NCX文件的navMap
///
/// # 参数
/// * `xml_content` - NCX文件的XML内容
///
/// # 返回值
/// * `Result<Vec<NavPoint>, EpubError>` - 按playOrder排序的顶层导航点
pub fn parse_ncx(xml_content: &str) -> Result<Vec<NavPoint>> {
    let mut reader = Reader::from_str(xml_content);
    reader.config_mut().trim_text(true);
    reader.config_mut().expand_empty_elements = true;

    let mut roots = Vec::new();
    // 尚未闭合的导航点，栈顶是当前导航点
    let mut stack: Vec<NavPoint> = Vec::new();
    let mut in_nav_map = false;
    let mut in_label = false;
    let mut text_content = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"navMap" => in_nav_map = true,
                b"navPoint" if in_nav_map => {
                    let play_order = attribute_text(e, b"playOrder")?.and_then(|v| v.trim().parse().ok());
                    stack.push(NavPoint {
                        play_order,
                        ..NavPoint::default()
                    });
                }
                b"navLabel" if in_nav_map => {
                    in_label = true;
                    text_content.clear();
                }
                b"content" if in_nav_map => {
                    if let Some(point) = stack.last_mut() {
                        point.href = attribute_text(e, b"src")?;
                    }
                }
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"navMap" => in_nav_map = false,
                b"navLabel" if in_label => {
                    in_label = false;
                    if let Some(point) = stack.last_mut() {
                        if point.label.is_empty() {
                            point.label = text_content.trim().to_string();
                        }
                    }
                }
                b"navPoint" if in_nav_map => {
                    if let Some(point) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(point),
                            None => roots.push(point),
                        }
                    }
                }
                _ => {}
            },
            Event::Text(e) if in_label => {
                if !text_content.is_empty() {
                    text_content.push(' ');
                }
                text_content.push_str(&e.unescape()?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    sort_by_play_order(&mut roots);
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::nav::flatten;

    #[test]
    fn test_parse_nested_ncx() {
        let ncx = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="urn:uuid:1"/></head>
  <docTitle><text>书名</text></docTitle>
  <navMap>
    <navPoint id="p2" playOrder="3">
      <navLabel><text>第二章</text></navLabel>
      <content src="ch2.xhtml"/>
    </navPoint>
    <navPoint id="p1" playOrder="1">
      <navLabel><text>第一章 &amp; 序</text></navLabel>
      <content src="ch1.xhtml"/>
      <navPoint id="p1a" playOrder="2">
        <navLabel><text>第一节</text></navLabel>
        <content src="ch1.xhtml#s1"/>
      </navPoint>
    </navPoint>
  </navMap>
</ncx>"#;

        let points = parse_ncx(ncx).unwrap();
        let entries = flatten(&points);
        let summary: Vec<(&str, &str, usize)> = entries
            .iter()
            .map(|e| (e.label.as_str(), e.href.as_str(), e.depth))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("第一章 & 序", "ch1.xhtml", 0),
                ("第一节", "ch1.xhtml#s1", 1),
                ("第二章", "ch2.xhtml", 0),
            ]
        );
    }

    #[test]
    fn test_doc_title_is_not_a_label() {
        let ncx = r#"<ncx><docTitle><text>标题</text></docTitle><navMap/></ncx>"#;
        assert!(parse_ncx(ncx).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_ncx_is_error() {
        assert!(parse_ncx("<ncx><navMap><navPoint></navMap></ncx>").is_err());
    }
}
