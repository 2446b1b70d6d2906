//! 统一读取入口
//!
//! 先按文件内容嗅探格式，内容无法判断时再看扩展名，然后分派给对应的加载器。

use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::Encoding;
use log::debug;
use zip::ZipArchive;

use crate::book::{BookFormat, LoadedBook};
use crate::config::ReaderConfig;
use crate::epub::{Container, Epub};
use crate::error::{ReaderError, Result};
use crate::fb2;

/// 嗅探时读取的文件头长度
const SNIFF_LENGTH: usize = 4096;

/// 按格式分派的书籍读取器
#[derive(Debug, Clone, Default)]
pub struct UnifiedReader {
    config: ReaderConfig,
}

impl UnifiedReader {
    /// 使用默认配置创建读取器
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// 打开一本书
    ///
    /// # 参数
    /// * `path` - 书籍文件路径
    ///
    /// # 返回值
    /// * `Result<LoadedBook, ReaderError>` - 加载完成的书籍；格式无法识别时返回
    ///   `UnsupportedFormat`，不会尝试解析
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<LoadedBook> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReaderError::FileNotFound(path.to_path_buf()));
        }

        let format = sniff_format(path)?;
        debug!("{} 识别为 {}", path.display(), format);

        let loaded = match format {
            BookFormat::Epub => Epub::new(path)?.load(path, &self.config)?,
            BookFormat::Fb2 => fb2::load(path, &self.config)?,
            BookFormat::Fb2Zip => fb2::load_zip(path, &self.config)?,
        };
        debug!(
            "已打开《{}》: {} 个章节, {} 个目录项",
            loaded.book.title,
            loaded.book.chapters.len(),
            loaded.toc.len()
        );
        Ok(loaded)
    }
}

/// 判断文件格式
///
/// ZIP签名优先（没有EPUB容器文件但含 `.fb2` 条目的压缩包视为FB2），
/// 其次是以 `<` 开头且文件头中出现 `FictionBook` 的XML，最后才看扩展名。
pub fn sniff_format(path: &Path) -> Result<BookFormat> {
    let mut head = Vec::with_capacity(SNIFF_LENGTH);
    File::open(path)?
        .take(SNIFF_LENGTH as u64)
        .read_to_end(&mut head)?;

    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        return sniff_archive(path);
    }
    if looks_like_fb2(&head) {
        return Ok(BookFormat::Fb2);
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "epub" => Ok(BookFormat::Epub),
        "fb2" => Ok(BookFormat::Fb2),
        "" => Err(ReaderError::UnsupportedFormat(path.display().to_string())),
        other => Err(ReaderError::UnsupportedFormat(format!(".{}", other))),
    }
}

fn sniff_archive(path: &Path) -> Result<BookFormat> {
    let archive = ZipArchive::new(File::open(path)?).map_err(|e| ReaderError::MalformedArchive(e.to_string()))?;
    if archive.index_for_name(Container::PATH).is_none() && fb2::find_fb2_entry(&archive).is_some() {
        Ok(BookFormat::Fb2Zip)
    } else {
        Ok(BookFormat::Epub)
    }
}

/// 文件头是否像FB2文档
///
/// 带BOM时（UTF-8或UTF-16）先按BOM解码文件头再判断。
fn looks_like_fb2(head: &[u8]) -> bool {
    if let Some((encoding, bom_length)) = Encoding::for_bom(head) {
        let (text, _) = encoding.decode_without_bom_handling(&head[bom_length..]);
        let text = text.trim_start();
        return text.starts_with('<') && text.contains("FictionBook");
    }
    let content = head.trim_ascii_start();
    content.starts_with(b"<") && content.windows(b"FictionBook".len()).any(|w| w == b"FictionBook")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{EpubFixture, write_zip, xhtml};
    use std::fs;

    const FB2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0">
  <body><section><title><p>A</p></title><p>alpha</p></section></body>
</FictionBook>"#;

    #[test]
    fn test_unsupported_format_is_not_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "just some text").unwrap();

        let err = UnifiedReader::new().open(&path).unwrap_err();
        assert!(matches!(err, ReaderError::UnsupportedFormat(_)), "{:?}", err);
    }

    #[test]
    fn test_missing_file() {
        let err = UnifiedReader::new().open("/definitely/not/here.epub").unwrap_err();
        assert!(matches!(err, ReaderError::FileNotFound(_)));
    }

    #[test]
    fn test_sniffs_content_before_extension() {
        let dir = tempfile::tempdir().unwrap();

        let fb2_path = dir.path().join("book.txt");
        fs::write(&fb2_path, format!("\u{feff}  {}", FB2)).unwrap();
        assert_eq!(sniff_format(&fb2_path).unwrap(), BookFormat::Fb2);

        let epub_path = EpubFixture::new("伪装")
            .chapter("a.xhtml", &xhtml("", "<p>a</p>"))
            .write(dir.path(), "book.zip");
        assert_eq!(sniff_format(&epub_path).unwrap(), BookFormat::Epub);

        let zipped = dir.path().join("book.fb2.zip");
        write_zip(&zipped, &[("book.fb2".to_string(), FB2.as_bytes().to_vec())]);
        assert_eq!(sniff_format(&zipped).unwrap(), BookFormat::Fb2Zip);

        let utf16 = dir.path().join("book.dat");
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(FB2.encode_utf16().flat_map(u16::to_le_bytes));
        fs::write(&utf16, &bytes).unwrap();
        assert_eq!(sniff_format(&utf16).unwrap(), BookFormat::Fb2);
        assert_eq!(UnifiedReader::new().open(&utf16).unwrap().text, "A\nalpha\n");

        let unknown_fb2 = dir.path().join("broken.fb2");
        fs::write(&unknown_fb2, "not xml at all").unwrap();
        assert_eq!(sniff_format(&unknown_fb2).unwrap(), BookFormat::Fb2);
    }

    #[test]
    fn test_open_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let reader = UnifiedReader::new();

        let epub_path = EpubFixture::new("书")
            .chapter("a.xhtml", &xhtml("甲", "<p>正文</p>"))
            .write(dir.path(), "book.epub");
        let epub = reader.open(&epub_path).unwrap();
        assert_eq!(epub.format, BookFormat::Epub);
        assert_eq!(epub.text, "正文\n");

        let fb2_path = dir.path().join("book.fb2");
        fs::write(&fb2_path, FB2).unwrap();
        let fb2 = reader.open(&fb2_path).unwrap();
        assert_eq!(fb2.format, BookFormat::Fb2);
        assert_eq!(fb2.text, "A\nalpha\n");

        let zipped = dir.path().join("zipped.fb2.zip");
        write_zip(&zipped, &[("inner.fb2".to_string(), FB2.as_bytes().to_vec())]);
        assert_eq!(reader.open(&zipped).unwrap().format, BookFormat::Fb2Zip);
    }

    #[test]
    fn test_loader_errors_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let reader = UnifiedReader::new();

        let no_opf = EpubFixture::new("无OPF")
            .chapter("a.xhtml", &xhtml("", "<p>a</p>"))
            .without_package()
            .write(dir.path(), "noopf.epub");
        assert!(matches!(reader.open(&no_opf), Err(ReaderError::MissingMetadata(_))));

        let unreadable = EpubFixture::new("全坏")
            .raw_chapter("bad.xhtml", b"\xff\xff\xff")
            .write(dir.path(), "bad.epub");
        assert!(matches!(reader.open(&unreadable), Err(ReaderError::MalformedArchive(_))));

        let garbage = dir.path().join("garbage.epub");
        fs::write(&garbage, "definitely not a zip").unwrap();
        assert!(matches!(reader.open(&garbage), Err(ReaderError::MalformedArchive(_))));

        let broken_fb2 = dir.path().join("broken.fb2");
        fs::write(&broken_fb2, "<FictionBook><body><section><p>x</section>").unwrap();
        assert!(matches!(reader.open(&broken_fb2), Err(ReaderError::MalformedMarkup { .. })));
    }
}
