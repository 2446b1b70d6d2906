//! FictionBook 2 文档解析
//!
//! 递归下降地读取 `description` 与 `body`，得到章节树。
//! 每个 `parse_*` 函数都在对应元素的开始标签之后被调用，
//! 并一直消费到与之匹配的结束标签为止。

use std::fmt;

use encoding_rs::Encoding;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;

use crate::epub::xml::attribute_value;
use crate::fb2::error::{Fb2Error, Result};
use crate::markup::{ParagraphCollector, collapse_whitespace};

/// 作者姓名
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fb2Author {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub nickname: String,
}

impl Fb2Author {
    fn push_field(&mut self, field: &[u8], text: &str) {
        let target = match field {
            b"first-name" => &mut self.first_name,
            b"middle-name" => &mut self.middle_name,
            b"last-name" => &mut self.last_name,
            b"nickname" => &mut self.nickname,
            _ => return,
        };
        target.push_str(text);
    }

    pub fn is_empty(&self) -> bool {
        self.to_string().is_empty()
    }
}

impl fmt::Display for Fb2Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = [&self.first_name, &self.middle_name, &self.last_name]
            .iter()
            .map(|part| collapse_whitespace(part))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            f.write_str(&collapse_whitespace(&self.nickname))
        } else {
            f.write_str(&full)
        }
    }
}

/// 章节树中的一个section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fb2Section {
    pub title: Option<String>,
    /// 第一个子section之前的段落（标题、题词、引言）
    pub paragraphs: Vec<String>,
    pub children: Vec<Fb2Section>,
    /// 由父级在子section之后的内容生成，不对应文档中的section元素
    pub continuation: bool,
}

/// 一个 `body` 元素
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fb2Body {
    /// `name` 属性，例如注释正文的 `notes`
    pub name: Option<String>,
    pub title: Option<String>,
    /// 第一个section之前的内容
    pub paragraphs: Vec<String>,
    /// section以及section之后内容生成的续接section，按文档顺序
    pub sections: Vec<Fb2Section>,
}

/// 解析后的FB2文档
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fb2Document {
    pub title: String,
    pub authors: Vec<Fb2Author>,
    /// `document-info/id`
    pub id: Option<String>,
    pub bodies: Vec<Fb2Body>,
}

/// 把原始字节解码为文本
///
/// 依次依据BOM、XML声明中的encoding属性判断编码，都没有时按UTF-8处理。
/// 含有非法字节序列时返回错误，不做替换。
pub fn decode_document(bytes: &[u8]) -> Result<String> {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        return decode_with(encoding, &bytes[bom_length..]);
    }
    match declared_encoding(bytes) {
        Some(encoding) if encoding != encoding_rs::UTF_8 => decode_with(encoding, bytes),
        _ => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| Fb2Error::Encoding(e.to_string())),
    }
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| Fb2Error::Encoding(format!("内容不是有效的{}文本", encoding.name())))
}

/// 读取XML声明里的encoding
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(256)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let declaration = String::from_utf8_lossy(&head[..end]);
    let rest = &declaration[declaration.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = rest[1..].split(quote).next()?;
    Encoding::for_label(value.trim().as_bytes())
}

/// 解析FB2文档
///
/// # 参数
/// * `xml` - 已解码的XML文本
/// * `placeholder` - 图片的占位文本
///
/// # 返回值
/// * `Result<Fb2Document, Fb2Error>` - 元数据与全部body
pub fn parse_document(xml: &str, placeholder: &str) -> Result<Fb2Document> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut document = Fb2Document::default();
    let mut seen_root = false;
    let mut root_closed = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if !seen_root {
                    if name != b"FictionBook" {
                        return Err(Fb2Error::NotFictionBook(String::from_utf8_lossy(&name).into_owned()));
                    }
                    seen_root = true;
                } else {
                    match name.as_slice() {
                        b"description" => parse_description(&mut reader, &mut document)?,
                        b"body" => {
                            let body_name = body_name(&e)?;
                            document.bodies.push(parse_body(&mut reader, body_name, placeholder)?);
                        }
                        // binary、stylesheet等
                        _ => skip_element(&mut reader, &name)?,
                    }
                }
            }
            Event::End(_) => root_closed = true,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(Fb2Error::NotFictionBook("文档中没有元素".to_string()));
    }
    if !root_closed {
        return Err(Fb2Error::UnclosedElement("FictionBook".to_string()));
    }

    document.title = collapse_whitespace(&document.title);
    document.authors.retain(|author| !author.is_empty());
    document.id = document
        .id
        .map(|id| collapse_whitespace(&id))
        .filter(|id| !id.is_empty());
    Ok(document)
}

fn body_name(e: &BytesStart<'_>) -> Result<Option<String>> {
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(quick_xml::Error::InvalidAttr)?;
        if attr.key.local_name().as_ref() == b"name" {
            return Ok(Some(attribute_value(&attr)));
        }
    }
    Ok(None)
}

fn unclosed(name: &[u8]) -> Fb2Error {
    Fb2Error::UnclosedElement(String::from_utf8_lossy(name).into_owned())
}

fn text_of(e: &BytesText<'_>) -> String {
    match e.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(e).into_owned(),
    }
}

fn skip_element(reader: &mut Reader<&[u8]>, name: &[u8]) -> Result<()> {
    let mut depth = 1usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => return Err(unclosed(name)),
            _ => {}
        }
        buf.clear();
    }
}

/// 读取description中需要的元数据
fn parse_description(reader: &mut Reader<&[u8]>, document: &mut Fb2Document) -> Result<()> {
    // description内部的元素路径
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"author" && path.len() == 1 && path[0] == b"title-info" {
                    document.authors.push(Fb2Author::default());
                }
                path.push(name);
            }
            Event::Text(e) => store_description_text(&path, &text_of(&e), document),
            Event::End(_) => {
                if path.pop().is_none() {
                    return Ok(());
                }
            }
            Event::Eof => return Err(unclosed(b"description")),
            _ => {}
        }
        buf.clear();
    }
}

fn store_description_text(path: &[Vec<u8>], text: &str, document: &mut Fb2Document) {
    let names: Vec<&[u8]> = path.iter().map(Vec::as_slice).collect();
    match names.as_slice() {
        [b"title-info", b"book-title"] => document.title.push_str(text),
        [b"title-info", b"author", field] => {
            if let Some(author) = document.authors.last_mut() {
                author.push_field(field, text);
            }
        }
        [b"document-info", b"id"] => document.id.get_or_insert_with(String::new).push_str(text),
        _ => {}
    }
}

fn parse_body(reader: &mut Reader<&[u8]>, name: Option<String>, placeholder: &str) -> Result<Fb2Body> {
    let mut body = Fb2Body {
        name,
        ..Fb2Body::default()
    };
    let mut intro = ParagraphCollector::new(placeholder);
    let mut trailing: Option<ParagraphCollector> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let element = e.local_name().as_ref().to_vec();
                match element.as_slice() {
                    b"section" => {
                        flush_trailing(&mut trailing, &body.title, &mut body.sections);
                        body.sections.push(parse_section(reader, placeholder)?);
                        trailing = Some(ParagraphCollector::new(placeholder));
                    }
                    b"title" => {
                        let target = trailing.as_mut().unwrap_or(&mut intro);
                        let title = parse_title(reader, target)?;
                        if body.title.is_none() {
                            body.title = title;
                        }
                    }
                    _ => parse_block(reader, &element, trailing.as_mut().unwrap_or(&mut intro))?,
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(unclosed(b"body")),
            _ => {}
        }
        buf.clear();
    }

    flush_trailing(&mut trailing, &body.title, &mut body.sections);
    body.paragraphs = intro.finish();
    Ok(body)
}

fn parse_section(reader: &mut Reader<&[u8]>, placeholder: &str) -> Result<Fb2Section> {
    let mut section = Fb2Section::default();
    let mut collector = ParagraphCollector::new(placeholder);
    // 第一个子section之后出现的内容
    let mut trailing: Option<ParagraphCollector> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let element = e.local_name().as_ref().to_vec();
                match element.as_slice() {
                    b"title" => {
                        let target = trailing.as_mut().unwrap_or(&mut collector);
                        let title = parse_title(reader, target)?;
                        if section.title.is_none() {
                            section.title = title;
                        }
                    }
                    b"section" => {
                        flush_trailing(&mut trailing, &section.title, &mut section.children);
                        section.children.push(parse_section(reader, placeholder)?);
                        trailing = Some(ParagraphCollector::new(placeholder));
                    }
                    _ => parse_block(reader, &element, trailing.as_mut().unwrap_or(&mut collector))?,
                }
            }
            Event::Text(e) => trailing.as_mut().unwrap_or(&mut collector).push_text(&text_of(&e)),
            Event::End(_) => break,
            Event::Eof => return Err(unclosed(b"section")),
            _ => {}
        }
        buf.clear();
    }

    flush_trailing(&mut trailing, &section.title, &mut section.children);
    section.paragraphs = collector.finish();
    Ok(section)
}

/// 子section之间或之后的内容按文档顺序另成一个续接section，沿用父级标题
fn flush_trailing(trailing: &mut Option<ParagraphCollector>, title: &Option<String>, sections: &mut Vec<Fb2Section>) {
    let Some(collector) = trailing.take() else {
        return;
    };
    let paragraphs = collector.finish();
    if !paragraphs.is_empty() {
        sections.push(Fb2Section {
            title: title.clone(),
            paragraphs,
            children: Vec::new(),
            continuation: true,
        });
    }
}

/// 标题写入正文段落，同时返回合并后的标题文本
fn parse_title(reader: &mut Reader<&[u8]>, collector: &mut ParagraphCollector) -> Result<Option<String>> {
    collector.break_paragraph();
    let start = collector.paragraph_index();
    parse_flow(reader, b"title", collector)?;
    collector.break_paragraph();

    let title = collector
        .paragraphs_from(start)
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Some(title).filter(|t| !t.is_empty()))
}

/// 处理块级上下文中出现的一个元素
fn parse_block(reader: &mut Reader<&[u8]>, name: &[u8], collector: &mut ParagraphCollector) -> Result<()> {
    match name {
        b"p" | b"v" | b"subtitle" | b"text-author" => {
            collector.break_paragraph();
            parse_inline(reader, name, collector)?;
            collector.break_paragraph();
        }
        b"tr" => {
            collector.break_paragraph();
            parse_row(reader, collector)?;
            collector.break_paragraph();
        }
        b"empty-line" => {
            collector.blank_line();
            skip_element(reader, name)?;
        }
        b"image" => {
            collector.break_paragraph();
            collector.push_placeholder();
            collector.break_paragraph();
            skip_element(reader, name)?;
        }
        b"binary" => skip_element(reader, name)?,
        b"stanza" => {
            parse_flow(reader, name, collector)?;
            collector.blank_line();
        }
        // poem、cite、epigraph、annotation、table等容器
        _ => parse_flow(reader, name, collector)?,
    }
    Ok(())
}

fn parse_flow(reader: &mut Reader<&[u8]>, name: &[u8], collector: &mut ParagraphCollector) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let element = e.local_name().as_ref().to_vec();
                parse_block(reader, &element, collector)?;
            }
            Event::Text(e) => collector.push_text(&text_of(&e)),
            Event::End(_) => {
                collector.break_paragraph();
                return Ok(());
            }
            Event::Eof => return Err(unclosed(name)),
            _ => {}
        }
        buf.clear();
    }
}

/// 段落内的行内内容
fn parse_inline(reader: &mut Reader<&[u8]>, name: &[u8], collector: &mut ParagraphCollector) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let element = e.local_name().as_ref().to_vec();
                if element == b"image" {
                    collector.push_placeholder();
                    skip_element(reader, &element)?;
                } else {
                    parse_inline(reader, &element, collector)?;
                }
            }
            Event::Text(e) => collector.push_text(&text_of(&e)),
            Event::CData(e) => collector.push_text(&String::from_utf8_lossy(&e)),
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(unclosed(name)),
            _ => {}
        }
        buf.clear();
    }
}

/// 表格行：单元格以空格分隔，整行是一个段落
fn parse_row(reader: &mut Reader<&[u8]>, collector: &mut ParagraphCollector) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let element = e.local_name().as_ref().to_vec();
                parse_inline(reader, &element, collector)?;
                collector.push_text(" ");
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(unclosed(b"tr")),
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACEHOLDER: &str = "[图片]";

    fn parse(xml: &str) -> Result<Fb2Document> {
        parse_document(xml, PLACEHOLDER)
    }

    #[test]
    fn test_parse_metadata() {
        let doc = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0">
  <description>
    <title-info>
      <author><first-name>Лев</first-name><last-name>Толстой</last-name></author>
      <author><nickname>anon</nickname></author>
      <book-title>  Война и мир </book-title>
    </title-info>
    <document-info>
      <author><nickname>scanner</nickname></author>
      <id>doc-42</id>
    </document-info>
  </description>
  <body><section><p>text</p></section></body>
</FictionBook>"#,
        )
        .unwrap();

        assert_eq!(doc.title, "Война и мир");
        let authors: Vec<String> = doc.authors.iter().map(|a| a.to_string()).collect();
        assert_eq!(authors, vec!["Лев Толстой", "anon"]);
        assert_eq!(doc.id.as_deref(), Some("doc-42"));
    }

    #[test]
    fn test_parse_nested_sections() {
        let doc = parse(
            r#"<FictionBook><body>
  <title><p>Book</p></title>
  <epigraph><p>motto</p><text-author>someone</text-author></epigraph>
  <section>
    <title><p>Part</p><p>One</p></title>
    <p>intro</p>
    <section><title><p>Inner</p></title><p>Hello <emphasis>world</emphasis></p></section>
    <section><p>untitled</p></section>
  </section>
</body></FictionBook>"#,
        )
        .unwrap();

        let body = &doc.bodies[0];
        assert_eq!(body.title.as_deref(), Some("Book"));
        assert_eq!(body.paragraphs, vec!["Book", "motto", "someone"]);

        let part = &body.sections[0];
        assert_eq!(part.title.as_deref(), Some("Part One"));
        assert_eq!(part.paragraphs, vec!["Part", "One", "intro"]);
        assert_eq!(part.children.len(), 2);
        assert_eq!(part.children[0].paragraphs, vec!["Inner", "Hello world"]);
        assert_eq!(part.children[1].title, None);
        assert!(part.children.iter().all(|child| !child.continuation));
    }

    #[test]
    fn test_content_after_subsections_keeps_order() {
        let doc = parse(
            r#"<FictionBook><body><section>
  <title><p>P</p></title><p>intro</p>
  <section><title><p>C</p></title><p>child</p></section>
  <p>between</p>
  <section><title><p>D</p></title><p>second</p></section>
  <p>tail</p>
</section></body></FictionBook>"#,
        )
        .unwrap();

        let parent = &doc.bodies[0].sections[0];
        assert_eq!(parent.paragraphs, vec!["P", "intro"]);
        let children: Vec<(Option<&str>, &[String], bool)> = parent
            .children
            .iter()
            .map(|c| (c.title.as_deref(), c.paragraphs.as_slice(), c.continuation))
            .collect();
        assert_eq!(children.len(), 4);
        assert_eq!(children[0].0, Some("C"));
        assert_eq!(children[1], (Some("P"), &["between".to_string()][..], true));
        assert_eq!(children[2].0, Some("D"));
        assert_eq!(children[3], (Some("P"), &["tail".to_string()][..], true));
    }

    #[test]
    fn test_poems_images_and_blank_lines() {
        let doc = parse(
            r##"<FictionBook><body><section>
  <p>a<image l:href="#img"/>b</p>
  <empty-line/>
  <poem><stanza><v>line one</v><v>line two</v></stanza><text-author>poet</text-author></poem>
  <image l:href="#img2"/>
  <table><tr><td>x</td><td>y</td></tr></table>
</section></body>
<binary id="img" content-type="image/png">AAAA</binary>
</FictionBook>"##,
        )
        .unwrap();

        assert_eq!(
            doc.bodies[0].sections[0].paragraphs,
            vec!["a [图片] b", "", "line one", "line two", "", "poet", "[图片]", "x y"]
        );
    }

    #[test]
    fn test_named_bodies() {
        let doc = parse(
            r#"<FictionBook><body><section><p>main</p></section></body>
<body name="notes"><section><title><p>1</p></title><p>note</p></section></body></FictionBook>"#,
        )
        .unwrap();
        assert_eq!(doc.bodies.len(), 2);
        assert_eq!(doc.bodies[0].name, None);
        assert_eq!(doc.bodies[1].name.as_deref(), Some("notes"));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            parse("<FictionBook><body><section><p>text</section></body></FictionBook>"),
            Err(Fb2Error::XmlError(_))
        ));
        assert!(matches!(
            parse("<FictionBook><body><section><p>text"),
            Err(Fb2Error::UnclosedElement(_))
        ));
        assert!(matches!(parse("<html><body/></html>"), Err(Fb2Error::NotFictionBook(_))));
        assert!(matches!(parse(""), Err(Fb2Error::NotFictionBook(_))));
    }

    #[test]
    fn test_decode_declared_encoding() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251
            .encode("<?xml version=\"1.0\" encoding=\"windows-1251\"?><FictionBook>Привет</FictionBook>");
        let text = decode_document(&bytes).unwrap();
        assert!(text.contains("Привет"));

        let mut with_bom = vec![0xEF, 0xBB, 0xBF];
        with_bom.extend_from_slice("<FictionBook/>".as_bytes());
        assert_eq!(decode_document(&with_bom).unwrap(), "<FictionBook/>");

        assert!(matches!(
            decode_document(&[b'<', 0xFF, 0xFE, 0xFD]),
            Err(Fb2Error::Encoding(_))
        ));
    }
}
