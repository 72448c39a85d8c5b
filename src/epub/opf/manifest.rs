//! 清单模块
//!
//! 提供EPUB包中文件清单的结构定义。

/// XHTML内容文档的媒体类型
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";
/// NCX导航文件的媒体类型
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";
/// CSS样式表的媒体类型
pub const CSS_MEDIA_TYPE: &str = "text/css";
/// JPEG图片的媒体类型
pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";

/// 清单项信息
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    /// 项目ID（只在所属的包内唯一）
    pub id: String,
    /// 文件路径(相对于OPF文件)
    pub href: String,
    /// 媒体类型
    pub media_type: String,
    /// 属性(如nav、cover-image等)
    pub properties: Option<String>,
}

impl ManifestItem {
    /// 创建新的清单项
    pub fn new(id: impl Into<String>, href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type: media_type.into(),
            properties: None,
        }
    }

    /// 创建带属性的清单项
    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        let properties = properties.into();
        self.properties = if properties.trim().is_empty() {
            None
        } else {
            Some(properties)
        };
        self
    }

    /// 检查是否包含指定属性
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|properties| properties.split_whitespace().any(|p| p == property))
    }

    /// 去掉指定的属性，返回剩余属性
    ///
    /// 合并后的包里只允许有一个导航文档和一个封面，
    /// 复制源书清单项时要去掉`nav`和`cover-image`。
    pub fn properties_without(&self, removed: &[&str]) -> Option<String> {
        let kept: Vec<&str> = self
            .properties
            .as_deref()?
            .split_whitespace()
            .filter(|p| !removed.contains(p))
            .collect();
        if kept.is_empty() {
            None
        } else {
            Some(kept.join(" "))
        }
    }

    /// 检查是否为导航文档
    pub fn is_nav(&self) -> bool {
        self.has_property("nav")
    }

    /// 检查是否为CSS文件
    pub fn is_css(&self) -> bool {
        self.media_type == CSS_MEDIA_TYPE
    }

    /// 检查是否为XHTML文件
    pub fn is_xhtml(&self) -> bool {
        self.media_type == XHTML_MEDIA_TYPE
    }

    /// 检查是否为NCX文件
    pub fn is_ncx(&self) -> bool {
        self.media_type == NCX_MEDIA_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties() {
        let item = ManifestItem::new("nav", "nav.xhtml", XHTML_MEDIA_TYPE).with_properties("nav scripted");
        assert!(item.is_nav());
        assert!(item.has_property("scripted"));
        assert!(!item.has_property("svg"));
        assert_eq!(item.properties_without(&["nav", "cover-image"]), Some("scripted".to_string()));
    }

    #[test]
    fn test_properties_without_removes_everything() {
        let item = ManifestItem::new("c", "c.jpg", JPEG_MEDIA_TYPE).with_properties("cover-image");
        assert_eq!(item.properties_without(&["nav", "cover-image"]), None);
    }

    #[test]
    fn test_empty_properties_are_none() {
        let item = ManifestItem::new("a", "a.css", CSS_MEDIA_TYPE).with_properties("  ");
        assert_eq!(item.properties, None);
        assert!(item.is_css());
    }
}
