//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）文件的XML解析功能。

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{manifest::ManifestItem, metadata::Metadata, spine::SpineItem};
use crate::epub::xml::{attribute_text, attribute_value};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// 当前所在的OPF区块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
}

/// 正在读取文本内容的元数据元素
#[derive(Debug)]
enum PendingText {
    DublinCore {
        tag: String,
        attributes: HashMap<String, String>,
    },
    Refinement {
        refines: String,
        property: String,
    },
}

/// OPF文件解析结果
#[derive(Debug, Clone)]
pub struct Opf {
    /// EPUB版本
    pub version: String,
    /// package元素的unique-identifier属性
    pub unique_identifier: Option<String>,
    /// 元数据
    pub metadata: Metadata,
    /// 清单项(文件列表)
    pub manifest: HashMap<String, ManifestItem>,
    /// 脊柱(阅读顺序)
    pub spine: Vec<SpineItem>,
    /// 脊柱的目录引用
    pub spine_toc: Option<String>,
}

impl Opf {
    /// 解析OPF文件内容
    ///
    /// # 参数
    /// * `xml_content` - OPF文件的XML内容
    ///
    /// # 返回值
    /// * `Result<Opf, EpubError>` - XML格式错误统一报告为 `OpfParseError`
    pub fn parse_xml(xml_content: &str) -> Result<Opf> {
        Self::parse_events(xml_content).map_err(|e| match e {
            EpubError::XmlError(xml_err) => EpubError::OpfParseError(format!("XML解析错误: {}", xml_err)),
            other => other,
        })
    }

    fn parse_events(xml_content: &str) -> Result<Opf> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;

        let mut opf = Opf {
            version: String::new(),
            unique_identifier: None,
            metadata: Metadata::new(),
            manifest: HashMap::new(),
            spine: Vec::new(),
            spine_toc: None,
        };
        let mut seen_package = false;

        let mut buf = Vec::new();
        let mut section = Section::None;
        let mut pending: Option<PendingText> = None;
        let mut text_content = String::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let local_name = e.local_name();
                    match (section, local_name.as_ref()) {
                        (_, b"package") => {
                            seen_package = true;
                            opf.version = attribute_text(e, b"version")?.unwrap_or_default();
                            opf.unique_identifier = attribute_text(e, b"unique-identifier")?;
                        }
                        (_, b"metadata") => section = Section::Metadata,
                        (_, b"manifest") => section = Section::Manifest,
                        (_, b"spine") => {
                            section = Section::Spine;
                            opf.spine_toc = attribute_text(e, b"toc")?;
                        }
                        (Section::Manifest, b"item") => {
                            if let Some(item) = Self::parse_manifest_item(e)? {
                                opf.manifest.insert(item.id.clone(), item);
                            }
                        }
                        (Section::Spine, b"itemref") => {
                            if let Some(item) = Self::parse_spine_item(e)? {
                                opf.spine.push(item);
                            }
                        }
                        (Section::Metadata, b"meta") => {
                            pending = Self::parse_refinement(e)?;
                            text_content.clear();
                        }
                        (Section::Metadata, tag) => {
                            pending = Some(PendingText::DublinCore {
                                tag: String::from_utf8_lossy(tag).into_owned(),
                                attributes: Self::collect_attributes(e),
                            });
                            text_content.clear();
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"metadata" | b"manifest" | b"spine" => section = Section::None,
                    _ if section == Section::Metadata => {
                        if let Some(done) = pending.take() {
                            Self::finish_metadata_element(&mut opf.metadata, done, &text_content);
                        }
                        text_content.clear();
                    }
                    _ => {}
                },
                Event::Text(e) => {
                    if pending.is_some() {
                        text_content.push_str(&e.unescape()?);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !seen_package {
            return Err(EpubError::OpfParseError("缺少package根元素".to_string()));
        }

        Ok(opf)
    }

    fn finish_metadata_element(metadata: &mut Metadata, pending: PendingText, text: &str) {
        let content = text.trim();
        if content.is_empty() {
            return;
        }
        match pending {
            PendingText::DublinCore { tag, attributes } => {
                metadata.add_dublin_core(tag, content.to_string(), attributes);
            }
            PendingText::Refinement { refines, property } => {
                metadata.add_refinement(&refines, property, content.to_string());
            }
        }
    }

    /// 收集元素的全部属性（按本地名称）
    fn collect_attributes(e: &BytesStart<'_>) -> HashMap<String, String> {
        e.attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                (key, attribute_value(&attr))
            })
            .collect()
    }

    /// 只关心带refines和property的meta标签
    fn parse_refinement(e: &BytesStart<'_>) -> Result<Option<PendingText>> {
        let refines = attribute_text(e, b"refines")?;
        let property = attribute_text(e, b"property")?;
        Ok(match (refines, property) {
            (Some(refines), Some(property)) => Some(PendingText::Refinement { refines, property }),
            _ => None,
        })
    }

    /// 解析清单项，缺少必需属性的项被忽略
    fn parse_manifest_item(e: &BytesStart<'_>) -> Result<Option<ManifestItem>> {
        let id = attribute_text(e, b"id")?.unwrap_or_default();
        let href = attribute_text(e, b"href")?.unwrap_or_default();
        if id.is_empty() || href.is_empty() {
            return Ok(None);
        }
        Ok(Some(ManifestItem {
            id,
            href,
            media_type: attribute_text(e, b"media-type")?.unwrap_or_default(),
            properties: attribute_text(e, b"properties")?,
        }))
    }

    /// 解析脊柱项
    fn parse_spine_item(e: &BytesStart<'_>) -> Result<Option<SpineItem>> {
        let Some(idref) = attribute_text(e, b"idref")?.filter(|idref| !idref.is_empty()) else {
            return Ok(None);
        };
        let linear = attribute_text(e, b"linear")?.is_none_or(|value| value.trim() != "no");
        Ok(Some(SpineItem::new(idref, linear)))
    }

    /// 用于派生书籍ID的标识符：unique-identifier指向的那个，否则第一个非空标识符
    pub fn book_identifier(&self) -> Option<String> {
        let identifiers = self.metadata.identifiers();
        let unique = self.unique_identifier.as_deref().and_then(|unique_id| {
            identifiers
                .iter()
                .find(|identifier| identifier.id.as_deref() == Some(unique_id))
        });
        unique
            .or_else(|| identifiers.iter().find(|identifier| !identifier.value.is_empty()))
            .map(|identifier| identifier.value.clone())
            .filter(|value| !value.is_empty())
    }

    /// 按阅读顺序排列的线性内容单元（非线性项和找不到清单项的引用被跳过）
    pub fn linear_spine(&self) -> Vec<&ManifestItem> {
        self.spine
            .iter()
            .filter(|spine_item| spine_item.linear)
            .filter_map(|spine_item| self.manifest.get(&spine_item.idref))
            .collect()
    }

    /// EPUB3导航文档
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        let mut items: Vec<&ManifestItem> = self.manifest.values().filter(|item| item.is_nav()).collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items.into_iter().next()
    }

    /// EPUB2 NCX文件：优先使用spine的toc属性，否则按媒体类型查找
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        if let Some(item) = self.spine_toc.as_ref().and_then(|id| self.manifest.get(id)) {
            return Some(item);
        }
        let mut items: Vec<&ManifestItem> = self.manifest.values().filter(|item| item.is_ncx()).collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="isbn">978-7-0000-0000-0</dc:identifier>
    <dc:identifier id="bookid">urn:uuid:1234</dc:identifier>
    <dc:title>示例图书</dc:title>
    <dc:creator id="creator1">张三</dc:creator>
    <meta refines="#creator1" property="role" scheme="marc:relators">aut</meta>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="text/ch%201.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="cover" linear="no"/>
    <itemref idref="ch1"/>
    <itemref idref="missing"/>
    <itemref idref="ch2" linear="yes"/>
  </spine>
</package>"##;

    #[test]
    fn test_parse_package_document() {
        let opf = Opf::parse_xml(OPF).unwrap();

        assert_eq!(opf.version, "3.0");
        assert_eq!(opf.metadata.title(), Some("示例图书".to_string()));
        assert_eq!(opf.metadata.authors(), vec!["张三"]);
        assert_eq!(opf.book_identifier(), Some("urn:uuid:1234".to_string()));
        assert_eq!(opf.manifest.len(), 5);
        assert_eq!(opf.spine.len(), 4);
        assert!(!opf.spine[0].linear);

        let linear: Vec<&str> = opf.linear_spine().iter().map(|item| item.id.as_str()).collect();
        assert_eq!(linear, vec!["ch1", "ch2"]);
        assert_eq!(opf.manifest["ch1"].href, "text/ch%201.xhtml");

        assert_eq!(opf.nav_item().map(|item| item.href.as_str()), Some("nav.xhtml"));
        assert_eq!(opf.ncx_item().map(|item| item.href.as_str()), Some("toc.ncx"));
    }

    #[test]
    fn test_identifier_fallback() {
        let xml = r#"<package version="2.0"><metadata>
            <identifier>  </identifier><identifier>plain-id</identifier>
        </metadata><manifest/><spine/></package>"#;
        let opf = Opf::parse_xml(xml).unwrap();
        assert_eq!(opf.book_identifier(), Some("plain-id".to_string()));
        assert!(opf.linear_spine().is_empty());
        assert!(opf.nav_item().is_none());
    }

    #[test]
    fn test_ncx_found_by_media_type() {
        let xml = r#"<package version="2.0"><manifest>
            <item id="toc" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
        </manifest><spine/></package>"#;
        let opf = Opf::parse_xml(xml).unwrap();
        assert_eq!(opf.ncx_item().map(|item| item.id.as_str()), Some("toc"));
    }

    #[test]
    fn test_malformed_package_is_opf_error() {
        let result = Opf::parse_xml("<package><metadata></package>");
        assert!(matches!(result, Err(EpubError::OpfParseError(_))));

        let result = Opf::parse_xml("<not-a-package/>");
        assert!(matches!(result, Err(EpubError::OpfParseError(_))));
    }
}
