//! 测试用的书籍文件构建工具

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::FileOptions;

/// 把条目依次写入一个ZIP文件
pub fn write_zip(path: &Path, entries: &[(String, Vec<u8>)]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, content) in entries {
        zip.start_file(name.as_str(), FileOptions::<()>::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap();
}

/// 生成一个简单的XHTML内容文档
pub fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{}</title></head>
<body>{}</body>
</html>"#,
        title, body
    )
}

/// EPUB测试文件构建器，内容文档都放在 `OEBPS/` 下
pub struct EpubFixture {
    title: String,
    identifier: Option<String>,
    mimetype: Option<String>,
    chapters: Vec<(String, Vec<u8>)>,
    nav: Option<String>,
    ncx: Option<String>,
    write_package: bool,
}

impl EpubFixture {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            identifier: Some("urn:uuid:fixture".to_string()),
            mimetype: Some("application/epub+zip".to_string()),
            chapters: Vec::new(),
            nav: None,
            ncx: None,
            write_package: true,
        }
    }

    /// 添加一个章节，`href` 相对于OPF所在目录
    pub fn chapter(mut self, href: &str, content: &str) -> Self {
        self.chapters.push((href.to_string(), content.as_bytes().to_vec()));
        self
    }

    /// 添加原始字节的章节（用于构造无法解码的内容）
    pub fn raw_chapter(mut self, href: &str, content: &[u8]) -> Self {
        self.chapters.push((href.to_string(), content.to_vec()));
        self
    }

    /// EPUB3导航文档，写入 `OEBPS/nav.xhtml`
    pub fn nav(mut self, content: &str) -> Self {
        self.nav = Some(content.to_string());
        self
    }

    /// NCX文件，写入 `OEBPS/toc.ncx`
    pub fn ncx(mut self, content: &str) -> Self {
        self.ncx = Some(content.to_string());
        self
    }

    pub fn identifier(mut self, identifier: Option<&str>) -> Self {
        self.identifier = identifier.map(str::to_string);
        self
    }

    pub fn mimetype(mut self, mimetype: Option<&str>) -> Self {
        self.mimetype = mimetype.map(str::to_string);
        self
    }

    /// 不写入OPF文件（container.xml仍然指向它）
    pub fn without_package(mut self) -> Self {
        self.write_package = false;
        self
    }

    fn package_document(&self) -> String {
        let mut manifest = String::new();
        let mut spine = String::new();
        for (i, (href, _)) in self.chapters.iter().enumerate() {
            manifest.push_str(&format!(
                "<item id=\"ch{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                i, href
            ));
            spine.push_str(&format!("<itemref idref=\"ch{}\"/>\n", i));
        }
        if self.nav.is_some() {
            manifest.push_str(
                "<item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
            );
        }
        if self.ncx.is_some() {
            manifest.push_str("<item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n");
        }
        let identifier = self
            .identifier
            .as_ref()
            .map(|id| format!("<dc:identifier id=\"BookId\">{}</dc:identifier>", id))
            .unwrap_or_default();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="3.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>{}</dc:title>
    <dc:creator>测试作者</dc:creator>
    {}
  </metadata>
  <manifest>
{}  </manifest>
  <spine{}>
{}  </spine>
</package>"#,
            self.title,
            identifier,
            manifest,
            if self.ncx.is_some() { " toc=\"ncx\"" } else { "" },
            spine
        )
    }

    /// 写入 `dir/name` 并返回路径
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let mut entries = Vec::new();
        if let Some(mimetype) = &self.mimetype {
            entries.push(("mimetype".to_string(), mimetype.as_bytes().to_vec()));
        }
        entries.push((
            "META-INF/container.xml".to_string(),
            br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#
                .to_vec(),
        ));
        if self.write_package {
            entries.push(("OEBPS/content.opf".to_string(), self.package_document().into_bytes()));
        }
        for (href, content) in &self.chapters {
            let decoded = percent_encoding::percent_decode_str(href).decode_utf8_lossy();
            entries.push((format!("OEBPS/{}", decoded), content.clone()));
        }
        if let Some(nav) = &self.nav {
            entries.push(("OEBPS/nav.xhtml".to_string(), nav.as_bytes().to_vec()));
        }
        if let Some(ncx) = &self.ncx {
            entries.push(("OEBPS/toc.ncx".to_string(), ncx.as_bytes().to_vec()));
        }

        let path = dir.join(name);
        write_zip(&path, &entries);
        path
    }
}
