//! 阅读引擎配置模块
//!
//! 提供引擎可调参数的配置管理功能，支持从YAML文件加载和导出配置。
//! 配置文件中缺失的字段使用默认值。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// 配置文件错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("无法读取配置文件 {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件格式错误: {0}")]
    Format(#[from] serde_yml::Error),

    #[error("写入配置文件失败: {0}")]
    Write(#[source] std::io::Error),
}

/// 阅读引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// 替换图片等非文本媒体的占位文本
    pub media_placeholder: String,
    /// FB2中无标题section的标签前缀，生成"Section N"
    pub section_label: String,
    /// 无标题章节显示名称的前缀，生成"Chapter N"
    pub chapter_label: String,
    /// 未命名书签的名称前缀，生成"Bookmark N"
    pub bookmark_label: String,
    /// 无法读取的内容单元所用的诊断标题，`{unit}` 会被替换为单元标识
    pub unreadable_title: String,
    /// 默认折行宽度（列）
    pub wrap_width: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            media_placeholder: "[image]".to_string(),
            section_label: "Section".to_string(),
            chapter_label: "Chapter".to_string(),
            bookmark_label: "Bookmark".to_string(),
            unreadable_title: "[无法读取: {unit}]".to_string(),
            wrap_width: 80,
        }
    }
}

impl ReaderConfig {
    /// 从YAML文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    /// * `Result<Self, ConfigError>` - 加载成功返回配置实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// 从YAML文本解析配置，空文本得到默认配置
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(content)?)
    }

    /// 指定了路径就从文件加载，否则使用默认配置
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// 序列化为带注释头的YAML文本
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        let yaml_content = serde_yml::to_string(self)?;
        Ok(format!(
            "# bookweave 阅读引擎配置文件\n# 缺失的字段使用默认值\n\n{}",
            yaml_content
        ))
    }

    /// 把配置写入指定文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_yaml()?;
        fs::write(path, content).map_err(ConfigError::Write)
    }

    /// 生成无法读取单元的诊断标题
    pub fn unreadable_title_for(&self, unit: &str) -> String {
        self.unreadable_title.replace("{unit}", unit)
    }
}
