//! EPUB 3导航文档（nav.xhtml）生成

use crate::epub::error::Result;
use crate::epub::ncx::NavigationEntry;
use crate::epub::path;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

/// 导航文档生成器
///
/// 目录项的`target`是相对于包文件目录的路径，
/// 写入时会换算成相对于导航文档自身位置的引用。
pub struct NavBuilder<'a> {
    title: &'a str,
    language: &'a str,
    nav_href: &'a str,
}

impl<'a> NavBuilder<'a> {
    pub fn new(title: &'a str, language: &'a str, nav_href: &'a str) -> Self {
        Self {
            title,
            language,
            nav_href,
        }
    }

    /// 生成导航文档；`with_page_list`为真时附带一份page-list导航
    pub fn build(&self, entries: &[NavigationEntry], with_page_list: bool) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::DocType(BytesText::from_escaped("html")))?;
        writer.write_event(Event::Start(BytesStart::new("html").with_attributes([
            ("xmlns", "http://www.w3.org/1999/xhtml"),
            ("xmlns:epub", "http://www.idpf.org/2007/ops"),
            ("lang", self.language),
            ("xml:lang", self.language),
        ])))?;

        writer.write_event(Event::Start(BytesStart::new("head")))?;
        Self::write_text_element(&mut writer, "title", self.title)?;
        writer.write_event(Event::End(BytesEnd::new("head")))?;

        writer.write_event(Event::Start(BytesStart::new("body")))?;

        writer.write_event(Event::Start(
            BytesStart::new("nav").with_attributes([("epub:type", "toc"), ("id", "toc")]),
        ))?;
        Self::write_text_element(&mut writer, "h1", self.title)?;
        if entries.is_empty() {
            // 导航列表不能为空
            let own = NavigationEntry::new(self.title, self.nav_href, 1);
            self.write_list(&mut writer, std::slice::from_ref(&own))?;
        } else {
            self.write_list(&mut writer, entries)?;
        }
        writer.write_event(Event::End(BytesEnd::new("nav")))?;

        if with_page_list && !entries.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("nav").with_attributes([
                ("epub:type", "page-list"),
                ("id", "page-list"),
                ("hidden", "hidden"),
            ])))?;
            self.write_list(&mut writer, entries)?;
            writer.write_event(Event::End(BytesEnd::new("nav")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("body")))?;
        writer.write_event(Event::End(BytesEnd::new("html")))?;
        Ok(writer.into_inner())
    }

    fn write_list(&self, writer: &mut Writer<Vec<u8>>, entries: &[NavigationEntry]) -> Result<()> {
        let nav_dir = path::parent_dir(self.nav_href);
        writer.write_event(Event::Start(BytesStart::new("ol")))?;
        for entry in entries {
            let href = path::relative_to(nav_dir, &entry.target);
            writer.write_event(Event::Start(BytesStart::new("li")))?;
            writer.write_event(Event::Start(
                BytesStart::new("a").with_attributes([("href", href.as_str())]),
            ))?;
            writer.write_event(Event::Text(BytesText::new(&entry.label)))?;
            writer.write_event(Event::End(BytesEnd::new("a")))?;
            writer.write_event(Event::End(BytesEnd::new("li")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("ol")))?;
        Ok(())
    }

    fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new(name)))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_lists_entries() {
        let entries = vec![
            NavigationEntry::new("A", "A/text/ch1.xhtml", 1),
            NavigationEntry::new("B", "B/ch1.xhtml", 2),
        ];
        let bytes = NavBuilder::new("合并", "zh-CN", "nav.xhtml").build(&entries, false).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains(r#"epub:type="toc""#));
        assert!(text.contains(r#"<a href="A/text/ch1.xhtml">A</a>"#));
        assert!(text.contains(r#"<a href="B/ch1.xhtml">B</a>"#));
        assert!(!text.contains("page-list"));
    }

    #[test]
    fn test_nav_with_page_list() {
        let entries = vec![NavigationEntry::new("1", "pages/page_0001.xhtml", 1)];
        let bytes = NavBuilder::new("合并", "zh-CN", "nav.xhtml").build(&entries, true).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#"epub:type="page-list""#));
    }

    #[test]
    fn test_empty_nav_points_to_itself() {
        let bytes = NavBuilder::new("合并", "zh-CN", "nav.xhtml").build(&[], true).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#"<a href="nav.xhtml">合并</a>"#));
        assert!(!text.contains("page-list"));
    }
}
