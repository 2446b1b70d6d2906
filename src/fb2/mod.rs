//! FB2加载器
//!
//! 把FictionBook 2文档（单独的 `.fb2` 或压缩在ZIP中的 `.fb2`）解析为章节树，
//! 再按文档顺序展开为线性章节列表。

pub mod error;
pub mod parser;

use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::Path;

use log::{debug, warn};
use zip::ZipArchive;

use crate::book::{Book, BookFormat, BookId, LinearTextBuilder, LoadedBook, Position, TocEntry};
use crate::config::ReaderConfig;
use crate::markup::{collapse_whitespace, paragraphs_text};

pub use error::{Fb2Error, Result};
pub use parser::{Fb2Author, Fb2Body, Fb2Document, Fb2Section, decode_document, parse_document};

/// 展开后的一个章节
struct ChapterPlan<'a> {
    title: Option<&'a str>,
    paragraphs: &'a [String],
    depth: usize,
}

/// 加载单独的 `.fb2` 文件
pub fn load(path: &Path, config: &ReaderConfig) -> Result<LoadedBook> {
    let bytes = fs::read(path)?;
    load_bytes(&bytes, path, BookFormat::Fb2, config)
}

/// 加载压缩在ZIP中的FB2文档（取第一个 `.fb2` 条目）
pub fn load_zip(path: &Path, config: &ReaderConfig) -> Result<LoadedBook> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    load_archive(&mut archive, path, config)
}

/// 从已打开的压缩包加载FB2文档
pub fn load_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    source: &Path,
    config: &ReaderConfig,
) -> Result<LoadedBook> {
    let entry = find_fb2_entry(archive).ok_or(Fb2Error::MissingEntry)?;
    debug!("从 {} 中读取FB2条目 {}", source.display(), entry);

    let mut bytes = Vec::new();
    archive.by_name(&entry)?.read_to_end(&mut bytes)?;
    load_bytes(&bytes, source, BookFormat::Fb2Zip, config)
}

/// 查找压缩包中第一个扩展名为 `.fb2` 的条目
pub fn find_fb2_entry<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<String> {
    archive
        .file_names()
        .find(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("fb2"))
        })
        .map(str::to_string)
}

/// 从原始字节加载
///
/// # 参数
/// * `bytes` - 文档字节
/// * `source` - 源文件路径，用于派生BookId和后备标题
/// * `format` - 记录在结果中的源格式
/// * `config` - 阅读配置
pub fn load_bytes(bytes: &[u8], source: &Path, format: BookFormat, config: &ReaderConfig) -> Result<LoadedBook> {
    let xml = decode_document(bytes)?;
    let document = parse_document(&xml, &config.media_placeholder)?;

    let book_id = match &document.id {
        Some(id) => BookId::from_identifier(id),
        None => BookId::from_path(source),
    };

    let plans = plan_chapters(&document);
    if plans.is_empty() {
        warn!("{} 中没有任何正文内容", source.display());
    }

    let mut builder = LinearTextBuilder::new();
    let mut toc = Vec::with_capacity(plans.len());
    for plan in plans {
        let index = builder.chapters().len();
        let title = plan
            .title
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("{} {}", config.section_label, index + 1));
        builder.push_chapter(title.clone(), &paragraphs_text(plan.paragraphs));
        toc.push(TocEntry::indented(&title, book_id.clone(), Position::new(index, 0), plan.depth));
    }

    let (text, chapters, total_characters) = builder.finish();
    debug!("FB2加载完成: {} 个章节, {} 个字符", chapters.len(), total_characters);

    let title = if document.title.is_empty() {
        source
            .file_stem()
            .map(|stem| stem.to_string_lossy().trim_end_matches(".fb2").to_string())
            .unwrap_or_default()
    } else {
        document.title.clone()
    };
    let author = document
        .authors
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(LoadedBook {
        book: Book {
            id: book_id,
            title,
            author,
            chapters,
            total_characters,
        },
        text,
        toc,
        format,
        diagnostics: Vec::new(),
    })
}

/// 把各个body的章节树按文档顺序展开
///
/// 第一个body是正文，它在第一个section之前的内容成为引言章节；
/// 其余body（例如注释）各自成为顶层章节，section挂在其下一层。
fn plan_chapters(document: &Fb2Document) -> Vec<ChapterPlan<'_>> {
    let mut plans = Vec::new();
    for (i, body) in document.bodies.iter().enumerate() {
        if i == 0 {
            if !body.paragraphs.is_empty() {
                let title = body
                    .title
                    .as_deref()
                    .or(Some(document.title.as_str()).filter(|t| !t.is_empty()));
                plans.push(ChapterPlan {
                    title,
                    paragraphs: &body.paragraphs,
                    depth: 0,
                });
            }
            for section in &body.sections {
                plan_section(section, 0, &mut plans);
            }
        } else {
            plans.push(ChapterPlan {
                title: body.title.as_deref().or(body.name.as_deref()),
                paragraphs: &body.paragraphs,
                depth: 0,
            });
            for section in &body.sections {
                plan_section(section, 1, &mut plans);
            }
        }
    }
    plans
}

fn plan_section<'a>(section: &'a Fb2Section, depth: usize, plans: &mut Vec<ChapterPlan<'a>>) {
    let has_own_content = section.title.is_some() || !section.paragraphs.is_empty();
    let child_depth = if section.children.is_empty() || has_own_content {
        plans.push(ChapterPlan {
            title: section.title.as_deref(),
            paragraphs: &section.paragraphs,
            depth,
        });
        depth + 1
    } else {
        // 没有任何自身内容的包装section不单独成章
        depth
    };
    for child in &section.children {
        plan_section(child, child_depth, plans);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_zip;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const TWO_SECTIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0">
  <description>
    <title-info><author><first-name>Ivan</first-name><last-name>Petrov</last-name></author><book-title>Test</book-title></title-info>
    <document-info><id>doc-1</id></document-info>
  </description>
  <body>
    <section><title><p>A</p></title><p>alpha</p></section>
    <section><title><p>B</p></title><p>beta</p></section>
  </body>
</FictionBook>"#;

    fn load_str(xml: &str) -> Result<LoadedBook> {
        load_bytes(xml.as_bytes(), Path::new("book.fb2"), BookFormat::Fb2, &ReaderConfig::default())
    }

    #[test]
    fn test_two_sections_become_two_chapters() {
        let loaded = load_str(TWO_SECTIONS).unwrap();
        let chapters = &loaded.book.chapters;

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "A");
        assert_eq!(loaded.chapter_text(0), Some("A\nalpha\n"));
        assert_eq!(chapters[1].offset, chapters[0].length);
        assert!(loaded.book.is_consistent());

        let positions: Vec<Position> = loaded.toc.iter().map(|e| e.pos).collect();
        assert_eq!(positions, vec![Position::new(0, 0), Position::new(1, 0)]);
        assert_eq!(loaded.book.title, "Test");
        assert_eq!(loaded.book.author, "Ivan Petrov");
        assert_eq!(loaded.book.id, BookId::from_identifier("doc-1"));
    }

    #[test]
    fn test_nested_sections_and_intro() {
        let loaded = load_str(
            r#"<FictionBook><body>
  <epigraph><p>motto</p></epigraph>
  <section>
    <title><p>Part I</p></title>
    <section><title><p>One</p></title><p>1</p></section>
    <section><p>2</p></section>
  </section>
  <section><section><p>wrapped</p></section></section>
</body>
<body name="notes"><section><title><p>n1</p></title><p>note</p></section></body>
</FictionBook>"#,
        )
        .unwrap();

        let titles: Vec<&str> = loaded.book.chapters.iter().map(|c| c.title.as_str()).collect();
        // 引言, Part I, One, 第4个章节没有标题, 包装section内的章节, notes, n1
        assert_eq!(titles, vec!["Section 1", "Part I", "One", "Section 4", "Section 5", "notes", "n1"]);

        let labels: Vec<&str> = loaded.toc.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Section 1", "Part I", "  One", "  Section 4", "Section 5", "notes", "  n1"]);
        assert_eq!(loaded.toc[2].depth, 1);
        assert_eq!(loaded.chapter_text(0), Some("motto\n"));
        assert!(loaded.book.is_consistent());
    }

    #[test]
    fn test_trailing_paragraphs_follow_subsections() {
        let loaded = load_str(
            r#"<FictionBook><body><section>
  <title><p>P</p></title><p>intro</p>
  <section><title><p>C</p></title><p>child</p></section>
  <p>tail</p>
</section></body></FictionBook>"#,
        )
        .unwrap();

        assert_eq!(loaded.text, "P\nintro\nC\nchild\ntail\n");
        let labels: Vec<&str> = loaded.toc.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["P", "  C", "  P"]);
        assert_eq!(loaded.toc[2].pos, Position::new(2, 0));
        assert!(loaded.book.is_consistent());
    }

    #[test]
    fn test_missing_metadata_falls_back() {
        let loaded = load_str("<FictionBook><body><section><p>x</p></section></body></FictionBook>").unwrap();
        assert_eq!(loaded.book.title, "book");
        assert_eq!(loaded.book.author, "");
        assert_eq!(loaded.book.id, BookId::from_path(Path::new("book.fb2")));
    }

    #[test]
    fn test_malformed_fb2_is_rejected() {
        assert!(load_str("<FictionBook><body><section><p>x</section>").is_err());
        assert!(matches!(load_str("<book/>"), Err(Fb2Error::NotFictionBook(_))));
    }

    #[test]
    fn test_load_zipped_fb2() {
        let dir = TempDir::new().unwrap();
        let path: PathBuf = dir.path().join("book.fb2.zip");
        write_zip(
            &path,
            &[
                ("readme.txt".to_string(), b"hello".to_vec()),
                ("book.fb2".to_string(), TWO_SECTIONS.as_bytes().to_vec()),
            ],
        );

        let loaded = load_zip(&path, &ReaderConfig::default()).unwrap();
        assert_eq!(loaded.format, BookFormat::Fb2Zip);
        assert_eq!(loaded.book.chapters.len(), 2);

        let empty = dir.path().join("empty.zip");
        write_zip(&empty, &[("readme.txt".to_string(), b"hello".to_vec())]);
        assert!(matches!(
            load_zip(&empty, &ReaderConfig::default()),
            Err(Fb2Error::MissingEntry)
        ));
    }
}
