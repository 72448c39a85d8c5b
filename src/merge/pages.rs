//! 单页规整模式
//!
//! 每个含有`.jpg`引用的XHTML文档生成一页：一张按页码重命名的图片加一个只包含这张图片的页面。
//! 页码在整次合并中连续递增，目录的playOrder与页码相同。
//! 全书只复制一份样式表，取自第一本清单中列有样式表的源书。

use once_cell::sync::Lazy;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use regex::bytes::Regex;

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{CSS_MEDIA_TYPE, JPEG_MEDIA_TYPE, ManifestItem, XHTML_MEDIA_TYPE};
use crate::epub::path;
use crate::epub::reader::SourceBook;
use crate::merge::MergeStrategy;
use crate::merge::book::{MergedBook, MergedItem, Payload};
use crate::merge::remap::PathRemapTable;

/// 以`.jpg`结尾的`src`/`href`属性值（含`xlink:href`），不区分大小写
static JPG_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:src|href)\s*=\s*["']([^"']+?\.jpg)["']"#).unwrap()
});

pub const STYLESHEET_HREF: &str = "styles/style.css";

/// 第`page`页的图片路径
pub fn image_href(page: u32) -> String {
    format!("images/{:04}.jpg", page)
}

/// 第`page`页的页面路径
pub fn page_href(page: u32) -> String {
    format!("pages/page_{:04}.xhtml", page)
}

/// 在文档原始内容中查找第一个指向包内的`.jpg`引用，URL等外部引用跳过
pub fn find_first_jpg(content: &[u8]) -> Option<String> {
    JPG_REFERENCE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .filter_map(|value| std::str::from_utf8(value.as_bytes()).ok())
        .find(|value| !path::is_external(value))
        .map(str::to_string)
}

/// 生成一页的XHTML
///
/// 页码同时用作标题和图片的替代文本；没有共享样式表时不写link元素。
pub fn build_page(page: u32, language: &str, with_stylesheet: bool) -> Result<Vec<u8>> {
    let label = page.to_string();
    let page_dir = path::parent_dir(&page_href(page)).to_string();
    let image = path::relative_to(&page_dir, &image_href(page));

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::DocType(BytesText::from_escaped("html")))?;
    writer.write_event(Event::Start(BytesStart::new("html").with_attributes([
        ("xmlns", "http://www.w3.org/1999/xhtml"),
        ("xmlns:epub", "http://www.idpf.org/2007/ops"),
        ("lang", language),
        ("xml:lang", language),
    ])))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    writer.write_event(Event::Start(BytesStart::new("title")))?;
    writer.write_event(Event::Text(BytesText::new(&label)))?;
    writer.write_event(Event::End(BytesEnd::new("title")))?;
    if with_stylesheet {
        let stylesheet = path::relative_to(&page_dir, STYLESHEET_HREF);
        writer.write_event(Event::Empty(BytesStart::new("link").with_attributes([
            ("rel", "stylesheet"),
            ("type", CSS_MEDIA_TYPE),
            ("href", stylesheet.as_str()),
        ])))?;
    }
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::Start(BytesStart::new("div").with_attributes([
        ("class", "page"),
        ("id", format!("page-{}", label).as_str()),
        ("epub:type", "pagebreak"),
        ("title", label.as_str()),
    ])))?;
    writer.write_event(Event::Empty(BytesStart::new("img").with_attributes([
        ("src", image.as_str()),
        ("alt", label.as_str()),
    ])))?;
    writer.write_event(Event::End(BytesEnd::new("div")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("html")))?;
    Ok(writer.into_inner())
}

#[derive(Debug, Default)]
pub struct PageNormalize {
    /// 按页码顺序的页面清单项ID
    pages: Vec<String>,
}

impl PageNormalize {
    pub fn new() -> Self {
        Self::default()
    }

    /// 选定共享样式表：第一本清单中列有样式表的源书的第一个样式表
    fn select_stylesheet(&self, sources: &[SourceBook], book: &mut MergedBook) -> Result<()> {
        let Some((source, item)) = sources
            .iter()
            .find_map(|source| source.opf.first_stylesheet().map(|item| (source, item)))
        else {
            tracing::warn!("所有源书都没有样式表, 页面将不引用样式表");
            return Ok(());
        };

        let archive_path = source
            .entry_path(&item.href)
            .map(|entry| path::decode_href(&entry))
            .ok_or_else(|| Self::missing(source, &item.href))?;
        let file = source.staged_file(&archive_path);
        if !file.is_file() {
            return Err(Self::missing(source, &archive_path));
        }

        let id = book.next_item_id();
        book.manifest.insert(MergedItem {
            item: ManifestItem::new(id, STYLESHEET_HREF, CSS_MEDIA_TYPE),
            payload: Payload::File(file),
            origin: Some(source.id.clone()),
        })?;
        book.stylesheet = Some(STYLESHEET_HREF.to_string());
        tracing::info!("使用 {} 中的 {} 作为共享样式表", source.path.display(), item.href);
        Ok(())
    }

    fn normalize_book(&mut self, source: &SourceBook, book: &mut MergedBook) -> Result<()> {
        let mut produced = 0u32;

        for item in source.content_documents() {
            let content = source.read_item(item)?;
            let Some(reference) = find_first_jpg(&content) else {
                tracing::warn!("{}: {} 中没有.jpg图片, 跳过", source.id.namespace, item.href);
                continue;
            };

            let doc_entry = source
                .entry_path(&item.href)
                .ok_or_else(|| Self::missing(source, &item.href))?;
            let doc_dir = path::parent_dir(&path::decode_href(&doc_entry)).to_string();
            let image_path = path::resolve(&doc_dir, &path::decode_href(&reference))
                .ok_or_else(|| Self::missing(source, &reference))?;
            let image_file = source.staged_file(&image_path);
            if !image_file.is_file() {
                return Err(Self::missing(source, &image_path));
            }

            let page = book.next_page();
            let image_id = book.next_item_id();
            book.manifest.insert(MergedItem {
                item: ManifestItem::new(image_id, image_href(page), JPEG_MEDIA_TYPE),
                payload: Payload::File(image_file),
                origin: Some(source.id.clone()),
            })?;

            let page_id = book.next_item_id();
            let markup = build_page(page, &book.language, book.stylesheet.is_some())?;
            book.manifest.insert(MergedItem {
                item: ManifestItem::new(page_id.clone(), page_href(page), XHTML_MEDIA_TYPE),
                payload: Payload::Bytes(markup),
                origin: Some(source.id.clone()),
            })?;
            self.pages.push(page_id);
            produced += 1;

            tracing::debug!("第 {} 页: {} ({})", page, image_path, item.href);
        }

        tracing::info!("{}: 生成 {} 页", source.path.display(), produced);
        Ok(())
    }

    /// `archive_path`为压缩包内的路径
    fn missing(source: &SourceBook, archive_path: &str) -> EpubError {
        EpubError::content_read(&source.path.join(archive_path), "文件不存在")
    }
}

impl MergeStrategy for PageNormalize {
    fn rewrite_and_rename(&mut self, sources: &[SourceBook], _table: &PathRemapTable, book: &mut MergedBook) -> Result<()> {
        self.select_stylesheet(sources, book)?;
        for source in sources {
            self.normalize_book(source, book)?;
        }
        Ok(())
    }

    fn assemble(&mut self, book: &mut MergedBook) -> Result<()> {
        for (index, page_id) in self.pages.iter().enumerate() {
            let page = index as u32 + 1;
            book.spine.push(page_id.clone());
            let play_order = book.push_navigation(page.to_string(), page_href(page));
            debug_assert_eq!(play_order, page);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_first_jpg() {
        let doc = br#"<p><img src="a.png"/><img SRC='Images/Scan01.JPG'/><img src="b.jpg"/></p>"#;
        assert_eq!(find_first_jpg(doc), Some("Images/Scan01.JPG".to_string()));

        let svg = br#"<svg><image xlink:href="../images/cover.jpg"/></svg>"#;
        assert_eq!(find_first_jpg(svg), Some("../images/cover.jpg".to_string()));

        assert_eq!(find_first_jpg(br#"<img src="a.jpeg"/><img src="b.png"/>"#), None);
        assert_eq!(find_first_jpg(b"<p>no images</p>"), None);
    }

    #[test]
    fn test_find_first_jpg_skips_external() {
        let doc = r#"<a href="https://example.com/big.jpg">大图</a><img src="images/a.jpg"/>"#.as_bytes();
        assert_eq!(find_first_jpg(doc), Some("images/a.jpg".to_string()));

        let only_external = br#"<img src="//cdn.example.com/a.jpg"/><img src="/abs/b.jpg"/>"#;
        assert_eq!(find_first_jpg(only_external), None);
    }

    #[test]
    fn test_layout_names() {
        assert_eq!(image_href(1), "images/0001.jpg");
        assert_eq!(page_href(12), "pages/page_0012.xhtml");
        assert_eq!(page_href(12345), "pages/page_12345.xhtml");
    }

    #[test]
    fn test_page_template() {
        let markup = String::from_utf8(build_page(3, "zh-CN", true).unwrap()).unwrap();
        assert!(markup.contains(r#"<title>3</title>"#));
        assert!(markup.contains(r#"src="../images/0003.jpg""#));
        assert!(markup.contains(r#"alt="3""#));
        assert!(markup.contains(r#"href="../styles/style.css""#));

        let plain = String::from_utf8(build_page(1, "zh-CN", false).unwrap()).unwrap();
        assert!(!plain.contains("<link"));
    }
}
