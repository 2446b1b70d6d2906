use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Fb2Error>;

/// FB2加载过程中的错误类型
#[derive(Error, Debug)]
pub enum Fb2Error {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("文档编码错误: {0}")]
    Encoding(String),

    #[error("根元素不是FictionBook: {0}")]
    NotFictionBook(String),

    #[error("元素 <{0}> 没有闭合")]
    UnclosedElement(String),

    #[error("压缩包中没有.fb2文件")]
    MissingEntry,
}
