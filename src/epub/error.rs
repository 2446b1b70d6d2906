use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpubError>;

/// Epub加载过程中的错误类型
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("container.xml解析错误: {0}")]
    ContainerParseError(String),

    #[error("OPF文件解析错误: {0}")]
    OpfParseError(String),

    #[error("脊柱中没有可线性阅读的内容单元")]
    EmptySpine,

    #[error("所有 {0} 个内容单元都无法读取")]
    NoReadableUnits(usize),
}

impl EpubError {
    /// 是否属于包文档（container.xml / OPF）缺失或损坏
    pub fn is_metadata_error(&self) -> bool {
        matches!(
            self,
            EpubError::ContainerParseError(_) | EpubError::OpfParseError(_) | EpubError::EmptySpine
        )
    }
}
