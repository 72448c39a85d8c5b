//! 路径重映射表
//!
//! 两级映射：外层以源书在输入列表中的位置为键，内层以压缩包内的原始路径为键，
//! 值为合并后带命名空间的路径。不同源书中相同的相对路径因此不会冲突。

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::epub::BookId;
use crate::epub::path;
use crate::epub::reader::SourceBook;
use crate::merge::{NAV_HREF, NCX_HREF, PACKAGE_HREF};

/// 为每个输入文件生成唯一的命名空间
///
/// 命名空间取自文件名（不含扩展名）；重名或与生成的文件同名时依次追加`_2`、`_3`……
/// 返回的顺序与输入顺序一致。
pub fn namespaces_for<P: AsRef<Path>>(inputs: &[P]) -> Vec<String> {
    let mut used: HashSet<String> = [PACKAGE_HREF, NAV_HREF, NCX_HREF]
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    let mut namespaces = Vec::with_capacity(inputs.len());

    for input in inputs {
        let stem = input
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = path::namespace_token(&stem);

        let mut candidate = base.clone();
        let mut suffix = 2;
        // 比较时忽略大小写，避免在大小写不敏感的文件系统上解压时互相覆盖
        while used.contains(&candidate.to_lowercase()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        if candidate != base {
            tracing::warn!("命名空间 {} 已被占用, {} 改用 {}", base, input.as_ref().display(), candidate);
        }
        used.insert(candidate.to_lowercase());
        namespaces.push(candidate);
    }

    namespaces
}

/// 把路径规整为表中的键：去掉`./`等冗余部分并做百分号解码
pub fn normalize_key(href: &str) -> Option<String> {
    path::resolve("", href).map(|p| path::decode_href(&p))
}

/// 包含`opf_dir`和所有`entries`的最深目录，作为该书在命名空间下的根
///
/// 清单项都在OPF目录内时就是OPF目录本身，否则逐级向上直到压缩包根目录。
pub fn common_root(opf_dir: &str, entries: &[String]) -> String {
    let mut root = opf_dir;
    while !root.is_empty() && !entries.iter().all(|entry| is_under(entry, root)) {
        root = path::parent_dir(root);
    }
    root.to_string()
}

fn is_under(entry: &str, dir: &str) -> bool {
    dir.is_empty() || entry.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

/// 一本源书的映射
#[derive(Debug, Default)]
struct BookPaths {
    /// 映射到命名空间目录的压缩包内目录
    root: String,
    /// 已解码的压缩包内路径 -> 合并后的路径
    targets: HashMap<String, String>,
}

/// 源书资源到合并后路径的映射表
///
/// 键是压缩包内的路径（不是相对于OPF的href），所以指向OPF目录之外的清单项也能登记。
#[derive(Debug, Default)]
pub struct PathRemapTable {
    books: HashMap<usize, BookPaths>,
}

impl PathRemapTable {
    /// 为所有源书的所有清单项登记映射
    pub fn build(books: &[SourceBook]) -> Self {
        let mut table = Self::default();
        for book in books {
            let entries: Vec<String> = book
                .manifest()
                .iter()
                .filter_map(|item| book.entry_path(&item.href))
                .collect();
            let root = common_root(book.opf_dir(), &entries);
            if root != book.opf_dir() {
                tracing::debug!("{}: 清单项超出OPF目录, 以 \"{}\" 为根", book.id.namespace, root);
            }

            table.set_root(&book.id, root);
            for entry in &entries {
                table.register(&book.id, entry);
            }
            tracing::debug!(
                "{}: 登记了 {} 条路径映射",
                book.id.namespace,
                table.books.get(&book.id.index).map_or(0, |paths| paths.targets.len())
            );
        }
        table
    }

    /// 设置源书映射到命名空间目录的根目录，应在登记之前调用
    pub fn set_root(&mut self, book: &BookId, root: impl Into<String>) {
        self.books.entry(book.index).or_default().root = root.into();
    }

    /// 登记一个压缩包内的条目，返回合并后的路径
    ///
    /// 目标路径保留原有的编码形式，去掉根目录后加上命名空间目录。
    /// 不在根目录下的条目不登记。
    pub fn register(&mut self, book: &BookId, entry: &str) -> Option<String> {
        let normalized = path::resolve("", entry)?;
        let paths = self.books.entry(book.index).or_default();

        let relative = if paths.root.is_empty() {
            normalized.as_str()
        } else {
            normalized.strip_prefix(paths.root.as_str())?.strip_prefix('/')?
        };
        let target = path::join(&book.namespace, relative);
        paths.targets.insert(path::decode_href(&normalized), target.clone());
        Some(target)
    }

    /// 按（源书, 压缩包内路径）精确查找
    ///
    /// `archive_path`是已解码、已规整的压缩包内路径。
    pub fn lookup(&self, book: &BookId, archive_path: &str) -> Option<&str> {
        self.books
            .get(&book.index)
            .and_then(|paths| paths.targets.get(archive_path))
            .map(String::as_str)
    }

    /// 查找压缩包内条目（编码形式）对应的合并后路径
    pub fn lookup_entry(&self, book: &BookId, entry: &str) -> Option<&str> {
        let key = normalize_key(entry)?;
        self.lookup(book, &key)
    }

    /// 映射总数
    pub fn len(&self) -> usize {
        self.books.values().map(|paths| paths.targets.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_in_two_books() {
        let x = BookId::new(0, "X");
        let y = BookId::new(1, "Y");
        let mut table = PathRemapTable::default();
        table.register(&x, "images/a.jpg");
        table.register(&y, "images/a.jpg");

        assert_eq!(table.lookup(&x, "images/a.jpg"), Some("X/images/a.jpg"));
        assert_eq!(table.lookup(&y, "images/a.jpg"), Some("Y/images/a.jpg"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lookup_is_exact() {
        let x = BookId::new(0, "X");
        let mut table = PathRemapTable::default();
        table.register(&x, "./text/ch1.xhtml");

        assert_eq!(table.lookup(&x, "text/ch1.xhtml"), Some("X/text/ch1.xhtml"));
        assert_eq!(table.lookup(&x, "text/ch1.xhtml#p1"), None);
        assert_eq!(table.lookup(&x, "Text/ch1.xhtml"), None);
        assert_eq!(table.lookup(&BookId::new(1, "X"), "text/ch1.xhtml"), None);
    }

    #[test]
    fn test_encoded_href() {
        let x = BookId::new(0, "X");
        let mut table = PathRemapTable::default();
        assert_eq!(table.register(&x, "my%20pic.jpg"), Some("X/my%20pic.jpg".to_string()));

        assert_eq!(table.lookup(&x, "my pic.jpg"), Some("X/my%20pic.jpg"));
        assert_eq!(table.lookup_entry(&x, "./my%20pic.jpg"), Some("X/my%20pic.jpg"));
    }

    #[test]
    fn test_root_is_stripped() {
        let x = BookId::new(0, "X");
        let mut table = PathRemapTable::default();
        table.set_root(&x, "OEBPS");

        assert_eq!(table.register(&x, "OEBPS/text/ch1.xhtml"), Some("X/text/ch1.xhtml".to_string()));
        assert_eq!(table.lookup(&x, "OEBPS/text/ch1.xhtml"), Some("X/text/ch1.xhtml"));
        assert_eq!(table.register(&x, "OEBPSX/a.jpg"), None);
        assert_eq!(table.register(&x, "fonts/x.ttf"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_common_root() {
        let inside = vec!["OEBPS/ch.xhtml".to_string(), "OEBPS/images/a.jpg".to_string()];
        assert_eq!(common_root("OEBPS", &inside), "OEBPS");

        let outside = vec!["OEBPS/ch.xhtml".to_string(), "fonts/x.ttf".to_string()];
        assert_eq!(common_root("OEBPS", &outside), "");

        let sibling = vec!["a/b/c.xhtml".to_string(), "a/d/x.ttf".to_string()];
        assert_eq!(common_root("a/b", &sibling), "a");

        assert_eq!(common_root("OEBPS", &["OEBPS2/x.css".to_string()]), "");
        assert_eq!(common_root("", &inside), "");
    }

    #[test]
    fn test_namespaces_disambiguated() {
        let inputs = ["a/book.epub", "b/book.epub", "c/Book.epub", "第一卷.epub", ".epub"];
        let namespaces = namespaces_for(&inputs);
        assert_eq!(namespaces, vec!["book", "book_2", "Book_3", "第一卷", "epub"]);
    }

    #[test]
    fn test_namespace_tokens_are_safe() {
        let namespaces = namespaces_for(&["my book#1.epub"]);
        assert_eq!(namespaces, vec!["my_book_1"]);
    }

    #[test]
    fn test_namespace_avoids_generated_files() {
        let namespaces = namespaces_for(&["nav.xhtml.epub", "toc.ncx.epub"]);
        assert_eq!(namespaces, vec!["nav.xhtml_2", "toc.ncx_2"]);
    }
}
