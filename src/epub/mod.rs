//! EPUB加载器
//!
//! 读取ZIP容器、container.xml、OPF包文档和导航文档，把脊柱中的内容单元
//! 依次规范化为章节文本。

pub mod error;
pub mod href;
pub mod nav;
pub mod opf;

mod container;
mod reader;
pub(crate) mod xml;

// 重新导出错误处理
pub use error::{EpubError, Result};

// 重新导出容器相关
pub use container::{Container, RootFile};

// 重新导出EPUB读取器
pub use reader::Epub;

// 重新导出OPF相关
pub use opf::{Creator, Identifier, ManifestItem, Metadata, Opf, SpineItem};
