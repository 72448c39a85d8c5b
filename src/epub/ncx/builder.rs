//! NCX生成模块

use crate::epub::error::Result;
use crate::epub::ncx::NavigationEntry;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

/// NCX文件生成器
pub struct NcxBuilder<'a> {
    uid: &'a str,
    title: &'a str,
    language: &'a str,
}

impl<'a> NcxBuilder<'a> {
    pub fn new(uid: &'a str, title: &'a str, language: &'a str) -> Self {
        Self { uid, title, language }
    }

    /// 生成NCX文件内容
    ///
    /// 每个目录项对应一个navPoint，playOrder按顺序从1开始重新编号。
    /// `total_pages`大于0时，目录项被视为页面：头部记录总页数与最大页码，
    /// 并额外生成一份pageList。
    pub fn build(&self, entries: &[NavigationEntry], total_pages: u32) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("ncx").with_attributes([
            ("xmlns", "http://www.daisy.org/z3986/2005/ncx/"),
            ("version", "2005-1"),
            ("xml:lang", self.language),
        ])))?;

        let total = total_pages.to_string();
        writer.write_event(Event::Start(BytesStart::new("head")))?;
        for (name, content) in [
            ("dtb:uid", self.uid),
            ("dtb:depth", "1"),
            ("dtb:totalPageCount", total.as_str()),
            ("dtb:maxPageNumber", total.as_str()),
        ] {
            writer.write_event(Event::Empty(
                BytesStart::new("meta").with_attributes([("name", name), ("content", content)]),
            ))?;
        }
        writer.write_event(Event::End(BytesEnd::new("head")))?;

        writer.write_event(Event::Start(BytesStart::new("docTitle")))?;
        Self::write_text(&mut writer, self.title)?;
        writer.write_event(Event::End(BytesEnd::new("docTitle")))?;

        writer.write_event(Event::Start(BytesStart::new("navMap")))?;
        for (index, entry) in entries.iter().enumerate() {
            let play_order = (index + 1).to_string();
            writer.write_event(Event::Start(BytesStart::new("navPoint").with_attributes([
                ("id", format!("navPoint-{}", play_order).as_str()),
                ("playOrder", play_order.as_str()),
            ])))?;
            Self::write_label_and_content(&mut writer, &entry.label, &entry.target)?;
            writer.write_event(Event::End(BytesEnd::new("navPoint")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("navMap")))?;

        if total_pages > 0 && !entries.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("pageList")))?;
            writer.write_event(Event::Start(BytesStart::new("navLabel")))?;
            Self::write_text(&mut writer, "页码")?;
            writer.write_event(Event::End(BytesEnd::new("navLabel")))?;
            for (index, entry) in entries.iter().enumerate() {
                let page = (index + 1).to_string();
                writer.write_event(Event::Start(BytesStart::new("pageTarget").with_attributes([
                    ("id", format!("page-{}", page).as_str()),
                    ("type", "normal"),
                    ("value", page.as_str()),
                    ("playOrder", page.as_str()),
                ])))?;
                Self::write_label_and_content(&mut writer, &entry.label, &entry.target)?;
                writer.write_event(Event::End(BytesEnd::new("pageTarget")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("pageList")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("ncx")))?;
        Ok(writer.into_inner())
    }

    fn write_text(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("text")))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new("text")))?;
        Ok(())
    }

    fn write_label_and_content(writer: &mut Writer<Vec<u8>>, label: &str, src: &str) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("navLabel")))?;
        Self::write_text(writer, label)?;
        writer.write_event(Event::End(BytesEnd::new("navLabel")))?;
        writer.write_event(Event::Empty(
            BytesStart::new("content").with_attributes([("src", src)]),
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::ncx::Ncx;

    fn entries() -> Vec<NavigationEntry> {
        vec![
            NavigationEntry::new("1", "pages/page_0001.xhtml", 1),
            NavigationEntry::new("2", "pages/page_0002.xhtml", 2),
            NavigationEntry::new("3", "pages/page_0003.xhtml", 3),
        ]
    }

    #[test]
    fn test_play_order_is_sequential() {
        let bytes = NcxBuilder::new("urn:uuid:1", "合并", "zh-CN").build(&entries(), 0).unwrap();
        let ncx = Ncx::parse(&bytes).unwrap();

        let orders: Vec<u32> = ncx.get_all_nav_points().iter().map(|p| p.play_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(ncx.nav_map.nav_points[2].content.src, "pages/page_0003.xhtml");
        assert_eq!(ncx.get_uid().map(String::as_str), Some("urn:uuid:1"));
        assert_eq!(ncx.get_title().map(String::as_str), Some("合并"));
        assert_eq!(ncx.metadata.total_page_count, Some(0));
        assert!(ncx.get_page_list().is_none());
    }

    #[test]
    fn test_page_totals_and_page_list() {
        let bytes = NcxBuilder::new("urn:uuid:1", "合并", "zh-CN").build(&entries(), 3).unwrap();
        let ncx = Ncx::parse(&bytes).unwrap();

        assert_eq!(ncx.metadata.total_page_count, Some(3));
        assert_eq!(ncx.metadata.max_page_number, Some(3));
        let page_list = ncx.get_page_list().unwrap();
        assert_eq!(page_list.page_targets.len(), 3);
        assert_eq!(page_list.page_targets[1].play_order, 2);
        assert_eq!(page_list.page_targets[1].content.src, "pages/page_0002.xhtml");
    }

    #[test]
    fn test_labels_are_escaped() {
        let entries = vec![NavigationEntry::new("A & <B>", "A/ch1.xhtml", 1)];
        let bytes = NcxBuilder::new("id", "t", "en").build(&entries, 0).unwrap();
        let ncx = Ncx::parse(&bytes).unwrap();
        assert_eq!(ncx.nav_map.nav_points[0].nav_label.text, "A & <B>");
    }
}
