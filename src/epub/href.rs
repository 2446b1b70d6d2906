//! 压缩包内路径与href的解析
//!
//! OPF和导航文档中的href都相对于各自所在的目录，可能带有百分号编码、
//! `.`/`..` 片段以及 `#fragment`。

use percent_encoding::percent_decode_str;

/// 一个解析后的链接目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HrefTarget {
    /// 规范化并解码后的压缩包内路径
    pub path: String,
    /// 片段标识（已解码），没有或为空时为 `None`
    pub fragment: Option<String>,
}

/// 文件所在目录，根目录下的文件返回空串
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// 百分号解码，无效的UTF-8序列按替换字符处理
pub fn decode(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}

/// 合并 `.` 和 `..` 片段，去掉重复的斜杠；越过根目录的 `..` 被丢弃
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// 把相对路径连接到基准目录上并规范化，以 `/` 开头的路径相对于压缩包根目录
pub fn join(base_dir: &str, relative: &str) -> String {
    if relative.starts_with('/') || base_dir.is_empty() {
        normalize(relative)
    } else {
        normalize(&format!("{}/{}", base_dir, relative))
    }
}

/// 指向压缩包外部的链接（http:、mailto: 等）
pub fn is_external(href: &str) -> bool {
    let scheme_end = href.find(':');
    let path_end = href.find(['/', '#', '?']).unwrap_or(href.len());
    matches!(scheme_end, Some(index) if index > 0 && index < path_end)
}

/// 解析导航文档中的链接
///
/// # 参数
/// * `base_dir` - 链接所在文档的目录
/// * `href` - 原始href
///
/// # 返回值
/// * `Option<HrefTarget>` - 外部链接返回 `None`；只有片段的链接指向 `base_doc`
pub fn resolve(base_dir: &str, base_doc: &str, href: &str) -> Option<HrefTarget> {
    let href = href.trim();
    if href.is_empty() || is_external(href) {
        return None;
    }

    let (path_part, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };
    let path_part = path_part.split('?').next().unwrap_or("");

    let path = if path_part.is_empty() {
        base_doc.to_string()
    } else {
        join(base_dir, &decode(path_part))
    };

    Some(HrefTarget {
        path,
        fragment: fragment.map(decode).filter(|fragment| !fragment.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir_and_join() {
        assert_eq!(parent_dir("OEBPS/content.opf"), "OEBPS");
        assert_eq!(parent_dir("content.opf"), "");
        assert_eq!(join("OEBPS", "text/ch1.xhtml"), "OEBPS/text/ch1.xhtml");
        assert_eq!(join("OEBPS/nav", "../text/./ch1.xhtml"), "OEBPS/text/ch1.xhtml");
        assert_eq!(join("OEBPS", "/root.xhtml"), "root.xhtml");
        assert_eq!(join("", "../../a.xhtml"), "a.xhtml");
    }

    #[test]
    fn test_resolve_decodes_and_splits_fragment() {
        let target = resolve("OEBPS", "OEBPS/nav.xhtml", "text/ch%201.xhtml#sec%2D2").unwrap();
        assert_eq!(target.path, "OEBPS/text/ch 1.xhtml");
        assert_eq!(target.fragment, Some("sec-2".to_string()));

        let target = resolve("OEBPS", "OEBPS/nav.xhtml", "#local").unwrap();
        assert_eq!(target.path, "OEBPS/nav.xhtml");
        assert_eq!(target.fragment, Some("local".to_string()));

        let target = resolve("", "toc.ncx", "ch2.xhtml#").unwrap();
        assert_eq!(target.fragment, None);
    }

    #[test]
    fn test_external_links_are_ignored() {
        assert!(resolve("", "nav.xhtml", "https://example.com/a.xhtml").is_none());
        assert!(resolve("", "nav.xhtml", "mailto:someone@example.com").is_none());
        assert!(resolve("", "nav.xhtml", "   ").is_none());
        assert!(!is_external("text/a:b.xhtml"));
    }
}
