//! 内容文档中的引用改写
//!
//! 直接在原始标记上做文本替换，不解析文档结构，因此格式不规范的文档也能处理。
//! 带`#片段`或`?查询`的引用不会被拆开查找，会原样保留。

use once_cell::sync::Lazy;
use regex::bytes::{Captures, Regex};

use crate::epub::BookId;
use crate::epub::path;
use crate::merge::remap::{PathRemapTable, normalize_key};

/// `href="…"`、`src="…"`（含`xlink:href`），单双引号均可
static REFERENCE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(href|src)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// 按重映射表改写一个内容文档
pub struct ReferenceRewriter<'a> {
    table: &'a PathRemapTable,
}

impl<'a> ReferenceRewriter<'a> {
    pub fn new(table: &'a PathRemapTable) -> Self {
        Self { table }
    }

    /// 改写`content`中所有能在表中找到的引用
    ///
    /// # 参数
    /// * `content` - 文档原始内容
    /// * `book` - 文档所属的源书
    /// * `doc_entry` - 文档在源压缩包内的路径
    ///
    /// 引用先按文档原来所在的目录解析成压缩包内路径再查表，
    /// 替换后的值相对于文档在合并后所在的目录。
    pub fn rewrite(&self, content: &[u8], book: &BookId, doc_entry: &str) -> Vec<u8> {
        let doc_key = normalize_key(doc_entry).unwrap_or_else(|| path::decode_href(doc_entry));
        let source_dir = path::parent_dir(&doc_key).to_string();
        let target_dir = match self.table.lookup(book, &doc_key) {
            Some(target) => path::parent_dir(target).to_string(),
            None => path::join(&book.namespace, path::parent_dir(doc_entry)),
        };

        let mut rewritten = 0usize;
        let result = REFERENCE_ATTR.replace_all(content, |caps: &Captures| {
            match self.substitute(caps, book, &source_dir, &target_dir) {
                Some(replacement) => {
                    rewritten += 1;
                    replacement
                }
                None => caps[0].to_vec(),
            }
        });

        tracing::debug!("{}/{}: 改写了 {} 处引用", book.namespace, doc_entry, rewritten);
        result.into_owned()
    }

    fn substitute(&self, caps: &Captures, book: &BookId, source_dir: &str, target_dir: &str) -> Option<Vec<u8>> {
        let value = caps.get(3).or_else(|| caps.get(4))?;
        let value = std::str::from_utf8(value.as_bytes()).ok()?;
        if path::is_external(value) {
            return None;
        }

        let archive_path = path::resolve(source_dir, &path::decode_href(value))?;
        let target = self.table.lookup(book, &archive_path)?;
        let relative = path::relative_to(target_dir, target);

        let mut replacement = Vec::with_capacity(caps[0].len() + relative.len());
        replacement.extend_from_slice(&caps[1]);
        replacement.extend_from_slice(&caps[2]);
        replacement.push(b'"');
        replacement.extend_from_slice(relative.as_bytes());
        replacement.push(b'"');
        Some(replacement)
    }
}

/// 便捷函数：按重映射表改写一个内容文档
pub fn rewrite(content: &[u8], book: &BookId, doc_entry: &str, table: &PathRemapTable) -> Vec<u8> {
    ReferenceRewriter::new(table).rewrite(content, book, doc_entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PathRemapTable {
        let mut table = PathRemapTable::default();
        let x = BookId::new(0, "X");
        let y = BookId::new(1, "Y");
        for href in ["ch1.xhtml", "text/ch2.xhtml", "images/a.jpg", "style.css"] {
            table.register(&x, href);
        }
        for href in ["ch1.xhtml", "images/a.jpg"] {
            table.register(&y, href);
        }
        table
    }

    /// 把改写后文档中的引用按文档的新位置解析成合并后的包内路径
    fn resolve_in_merged(doc_target: &str, value: &str) -> String {
        path::resolve(path::parent_dir(doc_target), value).unwrap()
    }

    fn first_value(content: &[u8]) -> String {
        let caps = REFERENCE_ATTR.captures(content).unwrap();
        let value = caps.get(3).or_else(|| caps.get(4)).unwrap();
        String::from_utf8(value.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_books_resolve_to_own_namespace() {
        let table = table();
        let doc = br#"<img src="images/a.jpg"/>"#;

        let x = rewrite(doc, &BookId::new(0, "X"), "ch1.xhtml", &table);
        let y = rewrite(doc, &BookId::new(1, "Y"), "ch1.xhtml", &table);

        assert_eq!(resolve_in_merged("X/ch1.xhtml", &first_value(&x)), "X/images/a.jpg");
        assert_eq!(resolve_in_merged("Y/ch1.xhtml", &first_value(&y)), "Y/images/a.jpg");
    }

    #[test]
    fn test_nested_document() {
        let table = table();
        let doc = br#"<link href='../style.css' rel="stylesheet"/><a href="../ch1.xhtml">1</a>"#;
        let out = rewrite(doc, &BookId::new(0, "X"), "text/ch2.xhtml", &table);
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            r#"<link href="../style.css" rel="stylesheet"/><a href="../ch1.xhtml">1</a>"#
        );
        assert_eq!(resolve_in_merged("X/text/ch2.xhtml", "../style.css"), "X/style.css");
    }

    #[test]
    fn test_reference_outside_package_dir() {
        let x = BookId::new(0, "X");
        let mut table = PathRemapTable::default();
        table.register(&x, "OEBPS/ch.xhtml");
        table.register(&x, "fonts/x.ttf");

        let doc = br#"<link rel="preload" href="../fonts/x.ttf"/>"#;
        let out = rewrite(doc, &x, "OEBPS/ch.xhtml", &table);
        assert_eq!(resolve_in_merged("X/OEBPS/ch.xhtml", &first_value(&out)), "X/fonts/x.ttf");
    }

    #[test]
    fn test_unmapped_references_unchanged() {
        let table = table();
        let doc = concat!(
            r#"<a href="http://example.com/a.jpg">x</a>"#,
            r#"<a href='#note'>n</a>"#,
            r#"<a href="ch1.xhtml#p2">p</a>"#,
            r#"<img src="images/missing.jpg"/>"#,
            r#"<img src="../../escape.jpg"/>"#,
        );
        let out = rewrite(doc.as_bytes(), &BookId::new(0, "X"), "ch1.xhtml", &table);
        assert_eq!(out, doc.as_bytes());
    }

    #[test]
    fn test_malformed_markup_tolerated() {
        let table = table();
        let doc = b"<p><img SRC = 'images/a.jpg'><b>unclosed</p";
        let out = rewrite(doc, &BookId::new(0, "X"), "ch1.xhtml", &table);
        assert_eq!(out, b"<p><img SRC = \"images/a.jpg\"><b>unclosed</p".to_vec());
    }

    #[test]
    fn test_xlink_href_and_non_utf8() {
        let table = table();
        let mut doc = b"<image xlink:href='images/a.jpg'/>".to_vec();
        doc.extend_from_slice(&[0xff, 0xfe]);
        let out = rewrite(&doc, &BookId::new(0, "X"), "ch1.xhtml", &table);

        assert!(out.starts_with(b"<image xlink:href=\"images/a.jpg\"/>"));
        assert!(out.ends_with(&[0xff, 0xfe]));
    }
}
