//! 合并配置模块
//!
//! 提供合并策略与输出元数据的配置，支持从YAML文件加载。

use crate::epub::error::{EpubError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// 默认书名
pub const DEFAULT_TITLE: &str = "合并后的EPUB";
/// 默认语言
pub const DEFAULT_LANGUAGE: &str = "zh-CN";
/// 默认输出文件名
pub const DEFAULT_OUTPUT: &str = "合并后的文件.epub";

/// 合并策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// 完整保留：复制所有资源，每本书在目录中占一项
    #[default]
    FullPreserve,
    /// 单页规整：每个含图片的文档生成一页
    PageNormalize,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::FullPreserve => write!(f, "full-preserve"),
            Strategy::PageNormalize => write!(f, "page-normalize"),
        }
    }
}

/// 合并配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// 合并策略
    pub strategy: Strategy,
    /// 合并后的书名
    pub title: String,
    /// 合并后的语言
    pub language: String,
    /// 合并后的唯一标识符，未设置时每次合并生成新的`urn:uuid:`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            title: DEFAULT_TITLE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            identifier: None,
        }
    }
}

impl MergeConfig {
    /// 从YAML文件加载配置，缺少的字段使用默认值
    ///
    /// # 示例
    ///
    /// ```rust,no_run
    /// use epubmerge::MergeConfig;
    /// let config = MergeConfig::from_file("merge.yaml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件 {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// 从YAML文本解析配置
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(content).map_err(|e| EpubError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 把默认配置写入`path`
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let yaml_content = serde_yml::to_string(&Self::default())
            .map_err(|e| EpubError::ConfigError(format!("序列化配置失败: {}", e)))?;

        let content_with_header = format!(
            "# EPUB合并配置文件\n# strategy: full-preserve 或 page-normalize\n# identifier: 可选，不填时每次合并生成新的UUID\n\n{}",
            yaml_content
        );

        fs::write(path.as_ref(), content_with_header)
            .map_err(|e| EpubError::ConfigError(format!("写入配置文件失败: {}", e)))?;
        Ok(())
    }

    /// 本次合并使用的标识符
    pub fn resolve_identifier(&self) -> String {
        match self.identifier.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("urn:uuid:{}", uuid::Uuid::new_v4()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MergeConfig::default();
        assert_eq!(config.strategy, Strategy::FullPreserve);
        assert_eq!(config.title, "合并后的EPUB");
        assert_eq!(config.language, "zh-CN");
        assert!(config.identifier.is_none());
    }

    #[test]
    fn test_partial_yaml() {
        let config = MergeConfig::from_yaml("strategy: page-normalize\ntitle: 漫画合集\n").unwrap();
        assert_eq!(config.strategy, Strategy::PageNormalize);
        assert_eq!(config.title, "漫画合集");
        assert_eq!(config.language, DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            MergeConfig::from_yaml("strategy: sideways\n"),
            Err(EpubError::ConfigError(_))
        ));
        assert!(matches!(
            MergeConfig::from_file("/definitely/not/here.yaml"),
            Err(EpubError::ConfigError(_))
        ));
    }

    #[test]
    fn test_generated_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge.yaml");
        MergeConfig::generate_default_config(&path).unwrap();
        assert_eq!(MergeConfig::from_file(&path).unwrap(), MergeConfig::default());
    }

    #[test]
    fn test_identifier() {
        let mut config = MergeConfig::default();
        let generated = config.resolve_identifier();
        assert!(generated.starts_with("urn:uuid:"));
        assert_ne!(generated, config.resolve_identifier());

        config.identifier = Some("isbn:123".to_string());
        assert_eq!(config.resolve_identifier(), "isbn:123");
    }
}
