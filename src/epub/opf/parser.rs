//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）文件的XML解析功能。

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{
    manifest::ManifestItem,
    metadata::{Metadata, MetaValue},
    spine::SpineItem,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// OPF文件解析结果
#[derive(Debug, Clone)]
pub struct Opf {
    /// EPUB版本
    pub version: String,
    /// package元素的unique-identifier属性
    pub unique_identifier: Option<String>,
    /// 元数据
    pub metadata: Metadata,
    /// 清单项(文件列表)，保持文档顺序
    pub manifest: Vec<ManifestItem>,
    /// 脊柱(阅读顺序)
    pub spine: Vec<SpineItem>,
    /// 脊柱的目录引用
    pub spine_toc: Option<String>,
}

#[derive(PartialEq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
}

/// 正在读取文本内容的metadata子元素
struct PendingElement {
    name: String,
    attributes: HashMap<String, String>,
}

impl Opf {
    /// 解析OPF文件的原始字节
    ///
    /// XML不合法、缺少manifest或spine元素时返回`PackageParse`。
    pub fn parse(bytes: &[u8]) -> Result<Opf> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| EpubError::PackageParse(format!("OPF文件不是有效的UTF-8: {}", e)))?;
        Self::parse_xml(text)
    }

    /// 解析OPF文件内容
    pub fn parse_xml(xml_content: &str) -> Result<Opf> {
        let xml_content = xml_content.trim_start_matches('\u{feff}');
        Self::parse_events(xml_content).map_err(|e| match e {
            EpubError::XmlError(xml_err) => EpubError::PackageParse(format!("XML解析错误: {}", xml_err)),
            other => other,
        })
    }

    fn parse_events(xml_content: &str) -> Result<Opf> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;

        let mut version = String::new();
        let mut unique_identifier = None;
        let mut metadata = Metadata::new();
        let mut manifest: Vec<ManifestItem> = Vec::new();
        let mut spine = Vec::new();
        let mut spine_toc = None;
        let mut seen_manifest = false;
        let mut seen_spine = false;
        let mut seen_package = false;

        let mut buf = Vec::new();
        let mut section = Section::None;
        let mut depth = 0usize;
        let mut text_content = String::new();
        let mut pending_element: Option<PendingElement> = None;
        let mut pending_meta: Option<HashMap<String, String>> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    depth += 1;
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                    match (local_name.as_str(), &section) {
                        ("package", _) => {
                            seen_package = true;
                            let attributes = Self::collect_attributes(e)?;
                            version = attributes.get("version").cloned().unwrap_or_default();
                            unique_identifier = attributes.get("unique-identifier").cloned();
                        }
                        ("metadata", _) => section = Section::Metadata,
                        ("manifest", _) => {
                            section = Section::Manifest;
                            seen_manifest = true;
                        }
                        ("spine", _) => {
                            section = Section::Spine;
                            seen_spine = true;
                            spine_toc = Self::collect_attributes(e)?.remove("toc");
                        }
                        ("item", Section::Manifest) => {
                            if let Some(item) = Self::parse_manifest_item(e)? {
                                if manifest.iter().any(|existing| existing.id == item.id) {
                                    tracing::warn!("OPF清单中存在重复的ID {}, 已忽略后者", item.id);
                                } else {
                                    manifest.push(item);
                                }
                            }
                        }
                        ("itemref", Section::Spine) => {
                            if let Some(item) = Self::parse_spine_item(e)? {
                                spine.push(item);
                            }
                        }
                        ("meta", Section::Metadata) => {
                            pending_meta = Some(Self::collect_attributes(e)?);
                            text_content.clear();
                        }
                        (_, Section::Metadata) => {
                            pending_element = Some(PendingElement {
                                name: local_name,
                                attributes: Self::collect_attributes(e)?,
                            });
                            text_content.clear();
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    depth = depth.saturating_sub(1);
                    let local_name_bytes = e.local_name();
                    let local_name = String::from_utf8_lossy(local_name_bytes.as_ref());

                    match local_name.as_ref() {
                        "metadata" | "manifest" | "spine" => section = Section::None,
                        "meta" if section == Section::Metadata => {
                            if let Some(attributes) = pending_meta.take() {
                                Self::push_meta(&mut metadata, attributes, text_content.trim());
                            }
                        }
                        name if section == Section::Metadata => {
                            if let Some(element) = pending_element.take_if(|el| el.name == name) {
                                let value = text_content.trim();
                                if !value.is_empty() {
                                    metadata.add_dublin_core(element.name, value.to_string(), element.attributes);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    text_content.push_str(&e.unescape()?);
                }
                Event::CData(e) => {
                    text_content.push_str(&String::from_utf8_lossy(&e));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if depth != 0 {
            return Err(EpubError::PackageParse("XML元素没有正确闭合".to_string()));
        }
        if !seen_package {
            return Err(EpubError::PackageParse("缺少package元素".to_string()));
        }
        if !seen_manifest {
            return Err(EpubError::PackageParse("缺少manifest元素".to_string()));
        }
        if !seen_spine {
            return Err(EpubError::PackageParse("缺少spine元素".to_string()));
        }

        Ok(Opf {
            version,
            unique_identifier,
            metadata,
            manifest,
            spine,
            spine_toc,
        })
    }

    /// 收集元素的全部属性（键为去掉前缀后的本地名）
    fn collect_attributes(e: &BytesStart) -> Result<HashMap<String, String>> {
        let mut attributes = HashMap::new();
        for attr_result in e.attributes() {
            let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
            let value = attr.unescape_value()?.to_string();
            attributes.insert(key, value);
        }
        Ok(attributes)
    }

    fn push_meta(metadata: &mut Metadata, mut attributes: HashMap<String, String>, text: &str) {
        let content = attributes
            .remove("content")
            .unwrap_or_else(|| text.to_string());
        let refines = attributes
            .remove("refines")
            .map(|r| r.trim_start_matches('#').to_string());

        if let Some(name) = attributes.remove("name") {
            if !content.is_empty() {
                metadata.add_meta(MetaValue::NameBased { name, content });
            }
            return;
        }

        let Some(property) = attributes.remove("property") else {
            return;
        };

        match refines {
            Some(refines_id) if !refines_id.is_empty() => metadata.add_meta(MetaValue::RefinesBased {
                refines_id,
                property,
                content,
                scheme: attributes.remove("scheme"),
            }),
            _ => metadata.add_meta(MetaValue::PropertyBased { property, content }),
        }
    }

    /// 解析清单项，缺少id、href或media-type的条目被忽略
    fn parse_manifest_item(e: &BytesStart) -> Result<Option<ManifestItem>> {
        let mut attributes = Self::collect_attributes(e)?;
        let (Some(id), Some(href), Some(media_type)) = (
            attributes.remove("id"),
            attributes.remove("href"),
            attributes.remove("media-type"),
        ) else {
            tracing::warn!("忽略不完整的清单项");
            return Ok(None);
        };
        if id.is_empty() || href.is_empty() {
            return Ok(None);
        }

        let mut item = ManifestItem::new(id, href, media_type);
        if let Some(properties) = attributes.remove("properties") {
            item = item.with_properties(properties);
        }
        Ok(Some(item))
    }

    /// 解析脊柱项
    fn parse_spine_item(e: &BytesStart) -> Result<Option<SpineItem>> {
        let attributes = Self::collect_attributes(e)?;
        match attributes.get("idref") {
            Some(idref) if !idref.is_empty() => {
                let linear = attributes.get("linear").map(|v| v != "no").unwrap_or(true);
                Ok(Some(SpineItem::with_linear(idref.clone(), linear)))
            }
            _ => Ok(None),
        }
    }

    /// 根据ID获取清单项
    pub fn get_manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// 获取导航文档的路径
    pub fn get_nav_path(&self) -> Option<String> {
        self.manifest
            .iter()
            .find(|item| item.is_nav())
            .map(|item| item.href.clone())
    }

    /// 获取NCX文件的路径（优先使用spine的toc属性）
    pub fn get_ncx_path(&self) -> Option<String> {
        self.spine_toc
            .as_deref()
            .and_then(|id| self.get_manifest_item(id))
            .or_else(|| self.manifest.iter().find(|item| item.is_ncx()))
            .map(|item| item.href.clone())
    }

    /// 按清单顺序获取所有XHTML内容文档
    pub fn content_documents(&self) -> impl Iterator<Item = &ManifestItem> {
        self.manifest.iter().filter(|item| item.is_xhtml())
    }

    /// 清单中的第一个CSS文件
    pub fn first_stylesheet(&self) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.is_css())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OPF: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<package version="3.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
        <dc:title>测试书籍</dc:title>
        <dc:creator id="creator1">测试作者</dc:creator>
        <meta refines="#creator1" property="role" scheme="marc:relators">aut</meta>
        <dc:language>zh-CN</dc:language>
        <dc:identifier id="BookId">urn:isbn:9781234567890</dc:identifier>
        <meta property="dcterms:modified">2025-06-05T11:24:01Z</meta>
        <meta name="cover" content="cover"/>
    </metadata>
    <manifest>
        <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
        <item id="css" href="styles/main.css" media-type="text/css"/>
        <item id="chapter2" href="text/chapter2.xhtml" media-type="application/xhtml+xml"/>
        <item id="chapter1" href="text/chapter1.xhtml" media-type="application/xhtml+xml"/>
        <item id="cover" href="images/cover.jpg" media-type="image/jpeg" properties="cover-image"/>
    </manifest>
    <spine toc="ncx">
        <itemref idref="chapter1"/>
        <itemref idref="chapter2" linear="no"/>
    </spine>
</package>"##;

    #[test]
    fn test_parse_full_package() {
        let opf = Opf::parse(SAMPLE_OPF.as_bytes()).expect("解析OPF失败");

        assert_eq!(opf.version, "3.0");
        assert_eq!(opf.unique_identifier.as_deref(), Some("BookId"));
        assert_eq!(opf.metadata.title(), Some("测试书籍".to_string()));
        assert_eq!(opf.metadata.language(), Some("zh-CN".to_string()));
        assert_eq!(opf.metadata.creators()[0].role, Some("author".to_string()));
        assert_eq!(opf.metadata.identifiers()[0].value, "urn:isbn:9781234567890");
        assert_eq!(opf.metadata.modified(), Some("2025-06-05T11:24:01Z".to_string()));
        assert_eq!(opf.metadata.meta_content("cover"), Some("cover".to_string()));
        assert_eq!(opf.spine_toc.as_deref(), Some("ncx"));
    }

    #[test]
    fn test_manifest_keeps_document_order() {
        let opf = Opf::parse(SAMPLE_OPF.as_bytes()).unwrap();
        let ids: Vec<&str> = opf.manifest.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["ncx", "css", "chapter2", "chapter1", "cover"]);

        let docs: Vec<&str> = opf.content_documents().map(|item| item.href.as_str()).collect();
        assert_eq!(docs, vec!["text/chapter2.xhtml", "text/chapter1.xhtml"]);
        assert_eq!(opf.first_stylesheet().map(|item| item.href.as_str()), Some("styles/main.css"));
        assert!(opf.get_manifest_item("cover").unwrap().has_property("cover-image"));
    }

    #[test]
    fn test_spine_and_navigation_lookups() {
        let opf = Opf::parse(SAMPLE_OPF.as_bytes()).unwrap();
        assert_eq!(opf.spine.len(), 2);
        assert!(!opf.spine[1].is_linear());
        assert_eq!(opf.get_ncx_path(), Some("toc.ncx".to_string()));
        assert_eq!(opf.get_nav_path(), None);
    }

    #[test]
    fn test_empty_manifest_and_spine_are_valid() {
        let simple_xml = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">"#,
            r#"<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">"#,
            r#"<dc:title>Test Book</dc:title>"#,
            r#"</metadata>"#,
            r#"<manifest></manifest>"#,
            r#"<spine></spine>"#,
            r#"</package>"#
        );

        let opf = Opf::parse_xml(simple_xml).expect("解析简单OPF失败");
        assert_eq!(opf.metadata.title(), Some("Test Book".to_string()));
        assert!(opf.manifest.is_empty());
        assert!(opf.spine.is_empty());
    }

    #[test]
    fn test_missing_spine_is_package_error() {
        let xml = r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
<metadata/>
<manifest><item id="a" href="a.xhtml" media-type="application/xhtml+xml"/></manifest>
</package>"#;
        match Opf::parse_xml(xml) {
            Err(EpubError::PackageParse(msg)) => assert!(msg.contains("spine")),
            other => panic!("期望PackageParse错误, 实际: {:?}", other),
        }
    }

    #[test]
    fn test_missing_manifest_is_package_error() {
        let xml = r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
<metadata/>
<spine/>
</package>"#;
        match Opf::parse_xml(xml) {
            Err(EpubError::PackageParse(msg)) => assert!(msg.contains("manifest")),
            other => panic!("期望PackageParse错误, 实际: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_xml_is_package_error() {
        let xml = r#"<package version="3.0"><manifest></spine></package>"#;
        assert!(matches!(Opf::parse_xml(xml), Err(EpubError::PackageParse(_))));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let xml = r#"<package version="2.0"><metadata/>
<manifest>
<item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
<item id="a" href="b.xhtml" media-type="application/xhtml+xml"/>
</manifest><spine><itemref idref="a"/></spine></package>"#;
        let opf = Opf::parse_xml(xml).unwrap();
        assert_eq!(opf.manifest.len(), 1);
        assert_eq!(opf.manifest[0].href, "a.xhtml");
    }
}
