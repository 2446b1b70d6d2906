use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use log::{debug, warn};
use zip::ZipArchive;

use crate::book::{Book, BookFormat, BookId, LinearTextBuilder, LoadedBook, Position, TocEntry};
use crate::config::ReaderConfig;
use crate::epub::container::Container;
use crate::epub::error::{EpubError, Result};
use crate::epub::href;
use crate::epub::nav::{self, NavEntry};
use crate::epub::opf::{ManifestItem, Opf};
use crate::markup::{MarkupError, NormalizedUnit, normalize_xhtml};

/// EPUB的mimetype文件应有的内容
const EPUB_MIMETYPE: &str = "application/epub+zip";

/// 一个脊柱内容单元的加载结果
struct SpineUnit {
    /// 解码并规范化后的压缩包内路径
    path: String,
    content: std::result::Result<NormalizedUnit, MarkupError>,
}

/// 表示一个EPUB文件
pub struct Epub<R: Read + Seek = File> {
    archive: ZipArchive<R>,
}

impl Epub<File> {
    /// 从文件路径创建Epub实例
    ///
    /// # 参数
    /// * `path` - epub文件的路径
    ///
    /// # 返回值
    /// * `Result<Epub, EpubError>` - 文件不是ZIP压缩包时返回错误
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Epub> {
        let file = File::open(path)?;
        Ok(Self::from_archive(ZipArchive::new(file)?))
    }
}

impl<R: Read + Seek> Epub<R> {
    /// 使用已打开的压缩包创建Epub实例
    pub fn from_archive(archive: ZipArchive<R>) -> Self {
        let mut epub = Epub { archive };
        epub.check_mimetype();
        epub
    }

    /// 检查mimetype文件
    ///
    /// 很多实际流通的EPUB文件在这里并不规范，问题只记录警告，不影响加载。
    fn check_mimetype(&mut self) {
        match self.archive.by_name("mimetype") {
            Ok(mut file) => {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_err() {
                    warn!("mimetype文件无法读取");
                    return;
                }
                let content = content.trim();
                if content == EPUB_MIMETYPE {
                    debug!("EPUB mimetype正确");
                } else {
                    warn!("无效的mimetype: 期望 {}, 找到 {}", EPUB_MIMETYPE, content);
                }
            }
            Err(_) => warn!("缺少mimetype文件"),
        }
    }

    /// 提取指定条目的二进制内容
    ///
    /// 先按原样查找，找不到时再按百分号解码后的名称查找。
    pub fn extract_binary_file(&mut self, filename: &str) -> Result<Vec<u8>> {
        let name = if self.archive.index_for_name(filename).is_some() {
            filename.to_string()
        } else {
            href::decode(filename)
        };
        let mut file = self.archive.by_name(&name)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// 提取指定条目的文本内容（去掉UTF-8 BOM）
    pub fn extract_file(&mut self, filename: &str) -> Result<String> {
        let bytes = self.extract_binary_file(filename)?;
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// 解析container.xml文件
    pub fn parse_container(&mut self) -> Result<Container> {
        let content = self
            .extract_file(Container::PATH)
            .map_err(|e| EpubError::ContainerParseError(format!("无法读取{}: {}", Container::PATH, e)))?;
        Container::parse_xml(&content).map_err(|e| match e {
            EpubError::XmlError(xml_err) => EpubError::ContainerParseError(format!("XML解析错误: {}", xml_err)),
            other => other,
        })
    }

    /// 获取主要的OPF文件路径
    pub fn get_opf_path(&mut self) -> Result<String> {
        let container = self.parse_container()?;
        container
            .package_path()
            .map(str::to_string)
            .ok_or_else(|| EpubError::ContainerParseError("container.xml中没有找到有效的rootfile".to_string()))
    }

    /// 解析OPF文件
    pub fn parse_opf(&mut self, opf_path: &str) -> Result<Opf> {
        let content = self
            .extract_file(opf_path)
            .map_err(|e| EpubError::OpfParseError(format!("无法读取{}: {}", opf_path, e)))?;
        Opf::parse_xml(&content)
    }

    /// 加载整本书
    ///
    /// # 参数
    /// * `source` - 源文件路径，文档没有标识符时用于派生书籍ID
    /// * `config` - 引擎配置
    ///
    /// # 返回值
    /// * `Result<LoadedBook, EpubError>` - 包文档缺失、脊柱为空或所有内容单元都无法读取时返回错误
    pub fn load(&mut self, source: &Path, config: &ReaderConfig) -> Result<LoadedBook> {
        let opf_path = self.get_opf_path()?;
        let opf = self.parse_opf(&opf_path)?;
        let opf_dir = href::parent_dir(&opf_path).to_string();

        let spine: Vec<ManifestItem> = opf.linear_spine().into_iter().cloned().collect();
        if spine.is_empty() {
            return Err(EpubError::EmptySpine);
        }
        debug!("OPF {} 版本 {}，线性脊柱 {} 项", opf_path, opf.version, spine.len());

        let units: Vec<SpineUnit> = spine
            .iter()
            .map(|item| self.load_unit(&opf_dir, item, config))
            .collect();
        if units.iter().all(|unit| unit.content.is_err()) {
            return Err(EpubError::NoReadableUnits(units.len()));
        }

        let book_id = match opf.book_identifier() {
            Some(identifier) => BookId::from_identifier(&identifier),
            None => BookId::from_path(source),
        };
        let nav_entries = self.load_navigation(&opf, &opf_dir);

        let mut builder = LinearTextBuilder::new();
        let mut diagnostics = Vec::new();
        let mut chapter_by_path: HashMap<&str, usize> = HashMap::new();

        for unit in &units {
            let (title, body) = match &unit.content {
                Ok(normalized) => (normalized.title.clone().unwrap_or_default(), normalized.text()),
                Err(err) => {
                    warn!("{}", err);
                    diagnostics.push(err.to_string());
                    (config.unreadable_title_for(&unit.path), String::new())
                }
            };
            let index = builder.push_chapter(title, &body);
            chapter_by_path.entry(unit.path.as_str()).or_insert(index);
        }

        let targets = resolve_nav_targets(&nav_entries, &chapter_by_path, &units);

        // 章节标题：内容单元标题 -> 第一个指向该单元的目录标签 -> "Chapter N"
        let untitled: Vec<usize> = builder
            .chapters()
            .iter()
            .filter(|chapter| chapter.title.trim().is_empty())
            .map(|chapter| chapter.index)
            .collect();
        for index in untitled {
            let title = targets
                .iter()
                .find(|target| target.pos.chapter_index == index && !target.label.is_empty())
                .map(|target| target.label.clone())
                .unwrap_or_else(|| format!("{} {}", config.chapter_label, index + 1));
            builder.set_title(index, title);
        }

        let (text, chapters, total_characters) = builder.finish();

        let mut toc: Vec<TocEntry> = targets
            .iter()
            .map(|target| {
                let label = if target.label.is_empty() {
                    chapters[target.pos.chapter_index].title.as_str()
                } else {
                    target.label.as_str()
                };
                TocEntry::indented(label, book_id.clone(), target.pos, target.depth)
            })
            .collect();
        if toc.is_empty() {
            debug!("没有可用的导航文档，按章节生成目录");
            toc = chapters
                .iter()
                .map(|chapter| TocEntry::indented(&chapter.title, book_id.clone(), Position::new(chapter.index, 0), 0))
                .collect();
        }

        let title = opf
            .metadata
            .title()
            .or_else(|| source.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
            .unwrap_or_default();

        Ok(LoadedBook {
            book: Book {
                id: book_id,
                title,
                author: opf.metadata.authors().join(", "),
                chapters,
                total_characters,
            },
            text,
            toc,
            format: BookFormat::Epub,
            diagnostics,
        })
    }

    /// 读取并规范化一个脊柱内容单元
    fn load_unit(&mut self, opf_dir: &str, item: &ManifestItem, config: &ReaderConfig) -> SpineUnit {
        let entry = href::join(opf_dir, &item.href);
        let path = href::join(opf_dir, &href::decode(&item.href));
        let content = match self.extract_binary_file(&entry) {
            Ok(bytes) => normalize_xhtml(&path, &bytes, &config.media_placeholder),
            Err(e) => Err(MarkupError::new(&path, format!("无法读取压缩包条目: {}", e))),
        };
        SpineUnit { path, content }
    }

    /// 读取导航文档：EPUB3导航优先，没有或为空时使用NCX
    ///
    /// 导航文档的问题不影响加载，只记录警告。
    fn load_navigation(&mut self, opf: &Opf, opf_dir: &str) -> Vec<(String, NavEntry)> {
        if let Some(item) = opf.nav_item() {
            let path = href::join(opf_dir, &href::decode(&item.href));
            match self.extract_file(&href::join(opf_dir, &item.href)) {
                Ok(content) => {
                    let entries = nav::flatten(&nav::parse_nav_document(&content));
                    if !entries.is_empty() {
                        debug!("使用EPUB3导航文档 {}，{} 个条目", path, entries.len());
                        return entries.into_iter().map(|entry| (path.clone(), entry)).collect();
                    }
                }
                Err(e) => warn!("无法读取导航文档 {}: {}", path, e),
            }
        }

        if let Some(item) = opf.ncx_item() {
            let path = href::join(opf_dir, &href::decode(&item.href));
            let parsed = self
                .extract_file(&href::join(opf_dir, &item.href))
                .and_then(|content| nav::parse_ncx(&content));
            match parsed {
                Ok(points) => {
                    let entries = nav::flatten(&points);
                    debug!("使用NCX {}，{} 个条目", path, entries.len());
                    return entries.into_iter().map(|entry| (path.clone(), entry)).collect();
                }
                Err(e) => warn!("无法解析NCX {}: {}", path, e),
            }
        }

        Vec::new()
    }
}

/// 目录条目解析后的目标
struct NavTarget {
    label: String,
    pos: Position,
    depth: usize,
}

/// 把导航条目映射到章节位置
///
/// 片段落在包含或紧随锚点的段落起点；未知片段落在章节起点；
/// 指向脊柱之外的条目被丢弃。
fn resolve_nav_targets(
    entries: &[(String, NavEntry)],
    chapter_by_path: &HashMap<&str, usize>,
    units: &[SpineUnit],
) -> Vec<NavTarget> {
    let mut targets = Vec::new();
    for (nav_path, entry) in entries {
        let Some(target) = href::resolve(href::parent_dir(nav_path), nav_path, &entry.href) else {
            debug!("忽略外部目录链接: {}", entry.href);
            continue;
        };
        let Some(&chapter_index) = chapter_by_path.get(target.path.as_str()) else {
            debug!("目录条目 {:?} 指向脊柱之外的 {}，已丢弃", entry.label, target.path);
            continue;
        };

        let offset = match (&units[chapter_index].content, target.fragment.as_deref()) {
            (Ok(unit), Some(fragment)) => unit.anchor_offset(fragment).unwrap_or_else(|| {
                debug!("锚点 #{} 在 {} 中不存在，使用章节起点", fragment, target.path);
                0
            }),
            _ => 0,
        };

        targets.push(NavTarget {
            label: entry.label.trim().to_string(),
            pos: Position::new(chapter_index, offset),
            depth: entry.depth,
        });
    }
    targets
}
