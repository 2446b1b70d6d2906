//! 引擎对外的错误类型
//!
//! 各加载器内部的错误（[`EpubError`]、[`Fb2Error`]）在这里归类，
//! 调用方只需要面对 [`ReaderError`]。

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::epub::EpubError;
use crate::fb2::Fb2Error;

pub type Result<T> = std::result::Result<T, ReaderError>;

/// 打开书籍时可能出现的错误
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("文件不存在: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("不支持的文件格式: {0}")]
    UnsupportedFormat(String),

    #[error("压缩包损坏: {0}")]
    MalformedArchive(String),

    #[error("缺少包文档或元数据: {0}")]
    MissingMetadata(String),

    #[error("标记解析失败 ({unit}): {reason}")]
    MalformedMarkup { unit: String, reason: String },

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

impl From<EpubError> for ReaderError {
    fn from(err: EpubError) -> Self {
        if err.is_metadata_error() {
            return ReaderError::MissingMetadata(err.to_string());
        }
        match err {
            EpubError::Io(e) => ReaderError::Io(e),
            EpubError::XmlError(e) => ReaderError::MalformedMarkup {
                unit: "package".to_string(),
                reason: e.to_string(),
            },
            other => ReaderError::MalformedArchive(other.to_string()),
        }
    }
}

impl From<Fb2Error> for ReaderError {
    fn from(err: Fb2Error) -> Self {
        match err {
            Fb2Error::Io(e) => ReaderError::Io(e),
            Fb2Error::Zip(_) | Fb2Error::MissingEntry => ReaderError::MalformedArchive(err.to_string()),
            other => ReaderError::MalformedMarkup {
                unit: "FictionBook".to_string(),
                reason: other.to_string(),
            },
        }
    }
}
