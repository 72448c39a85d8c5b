//! OPF生成模块
//!
//! 为合并后的书生成EPUB 3包文件。导航文档（nav.xhtml）和NCX由生成器自动加入清单，
//! 调用方只需提供资源清单和阅读顺序。

use crate::epub::error::Result;
use crate::epub::opf::manifest::{ManifestItem, NCX_MEDIA_TYPE, XHTML_MEDIA_TYPE};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

/// 生成的导航文档在清单中的ID
pub const NAV_ID: &str = "nav";
/// 生成的NCX在清单中的ID
pub const NCX_ID: &str = "ncx";

/// 写入包文件的元数据
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    /// 唯一标识符（写入dc:identifier和NCX的dtb:uid）
    pub identifier: String,
    pub title: String,
    pub language: String,
    /// 作者，按出现顺序
    pub creators: Vec<String>,
    /// dcterms:modified，格式为`CCYY-MM-DDThh:mm:ssZ`
    pub modified: String,
}

/// 包文件生成器
pub struct OpfBuilder<'a> {
    metadata: &'a PackageMetadata,
    nav_href: &'a str,
    ncx_href: &'a str,
}

impl<'a> OpfBuilder<'a> {
    pub fn new(metadata: &'a PackageMetadata, nav_href: &'a str, ncx_href: &'a str) -> Self {
        Self {
            metadata,
            nav_href,
            ncx_href,
        }
    }

    /// 生成OPF文件内容
    ///
    /// `spine`中的ID必须是`manifest`中的ID或[`NAV_ID`]。
    pub fn build<'m, I>(&self, manifest: I, spine: &[String]) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = &'m ManifestItem>,
    {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("package").with_attributes([
            ("xmlns", "http://www.idpf.org/2007/opf"),
            ("version", "3.0"),
            ("unique-identifier", "BookId"),
        ])))?;

        self.write_metadata(&mut writer)?;

        writer.write_event(Event::Start(BytesStart::new("manifest")))?;
        Self::write_item(
            &mut writer,
            &ManifestItem::new(NAV_ID, self.nav_href, XHTML_MEDIA_TYPE).with_properties("nav"),
        )?;
        Self::write_item(&mut writer, &ManifestItem::new(NCX_ID, self.ncx_href, NCX_MEDIA_TYPE))?;
        for item in manifest {
            Self::write_item(&mut writer, item)?;
        }
        writer.write_event(Event::End(BytesEnd::new("manifest")))?;

        writer.write_event(Event::Start(
            BytesStart::new("spine").with_attributes([("toc", NCX_ID)]),
        ))?;
        for idref in spine {
            writer.write_event(Event::Empty(
                BytesStart::new("itemref").with_attributes([("idref", idref.as_str())]),
            ))?;
        }
        writer.write_event(Event::End(BytesEnd::new("spine")))?;

        writer.write_event(Event::End(BytesEnd::new("package")))?;
        Ok(writer.into_inner())
    }

    fn write_metadata(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let metadata = self.metadata;
        writer.write_event(Event::Start(BytesStart::new("metadata").with_attributes([
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:opf", "http://www.idpf.org/2007/opf"),
        ])))?;

        Self::write_text_element(
            writer,
            BytesStart::new("dc:identifier").with_attributes([("id", "BookId")]),
            &metadata.identifier,
        )?;
        Self::write_text_element(writer, BytesStart::new("dc:title"), &metadata.title)?;
        Self::write_text_element(writer, BytesStart::new("dc:language"), &metadata.language)?;
        for creator in &metadata.creators {
            Self::write_text_element(writer, BytesStart::new("dc:creator"), creator)?;
        }
        Self::write_text_element(
            writer,
            BytesStart::new("meta").with_attributes([("property", "dcterms:modified")]),
            &metadata.modified,
        )?;

        writer.write_event(Event::End(BytesEnd::new("metadata")))?;
        Ok(())
    }

    fn write_text_element(writer: &mut Writer<Vec<u8>>, start: BytesStart, text: &str) -> Result<()> {
        let end = start.to_end().into_owned();
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(end))?;
        Ok(())
    }

    fn write_item(writer: &mut Writer<Vec<u8>>, item: &ManifestItem) -> Result<()> {
        let mut start = BytesStart::new("item").with_attributes([
            ("id", item.id.as_str()),
            ("href", item.href.as_str()),
            ("media-type", item.media_type.as_str()),
        ]);
        if let Some(properties) = &item.properties {
            start.push_attribute(("properties", properties.as_str()));
        }
        writer.write_event(Event::Empty(start))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::opf::Opf;

    fn sample_metadata() -> PackageMetadata {
        PackageMetadata {
            identifier: "urn:uuid:0b4a5c9e-1111-4222-8333-444455556666".to_string(),
            title: "合并后的EPUB & 附录".to_string(),
            language: "zh-CN".to_string(),
            creators: vec!["作者甲".to_string()],
            modified: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_build_opf_parses_back() {
        let metadata = sample_metadata();
        let items = vec![
            ManifestItem::new("item-0001", "A/text/ch1.xhtml", XHTML_MEDIA_TYPE),
            ManifestItem::new("item-0002", "A/images/a.jpg", "image/jpeg"),
            ManifestItem::new("item-0003", "B/text/ch1.xhtml", XHTML_MEDIA_TYPE).with_properties("svg"),
        ];
        let spine = vec![NAV_ID.to_string(), "item-0001".to_string(), "item-0003".to_string()];

        let bytes = OpfBuilder::new(&metadata, "nav.xhtml", "toc.ncx")
            .build(&items, &spine)
            .unwrap();
        let opf = Opf::parse(&bytes).unwrap();

        assert_eq!(opf.version, "3.0");
        assert_eq!(opf.metadata.title(), Some("合并后的EPUB & 附录".to_string()));
        assert_eq!(opf.metadata.language(), Some("zh-CN".to_string()));
        assert_eq!(opf.metadata.identifiers()[0].value, metadata.identifier);
        assert_eq!(opf.metadata.modified(), Some("2026-01-01T00:00:00Z".to_string()));

        assert_eq!(opf.manifest.len(), items.len() + 2);
        assert_eq!(opf.get_nav_path(), Some("nav.xhtml".to_string()));
        assert_eq!(opf.get_ncx_path(), Some("toc.ncx".to_string()));
        assert!(opf.get_manifest_item("item-0003").unwrap().has_property("svg"));

        let idrefs: Vec<&str> = opf.spine.iter().map(|s| s.idref.as_str()).collect();
        assert_eq!(idrefs, vec!["nav", "item-0001", "item-0003"]);
    }
}
