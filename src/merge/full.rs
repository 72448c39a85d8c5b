//! 完整保留模式
//!
//! 复制每本源书的全部清单项，路径加上命名空间目录，XHTML文档中的引用随之改写。
//! 每本书在目录中占一项，指向它的第一个XHTML文档。

use crate::epub::error::{EpubError, Result};
use crate::epub::path;
use crate::epub::opf::{ManifestItem, NAV_ID};
use crate::epub::reader::SourceBook;
use crate::merge::MergeStrategy;
use crate::merge::book::{MergedBook, MergedItem, Payload};
use crate::merge::remap::PathRemapTable;
use crate::merge::rewrite::ReferenceRewriter;

/// 复制到合并结果中的清单项不能带的属性（合并后各自只能有一个）
const EXCLUSIVE_PROPERTIES: &[&str] = &["nav", "cover-image"];

/// 一本书复制完成后的记录，用于组装阅读顺序和目录
#[derive(Debug)]
struct CopiedBook {
    namespace: String,
    /// 按清单顺序的XHTML文档：(合并后的ID, 合并后的路径)
    documents: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct FullPreserve {
    copied: Vec<CopiedBook>,
}

impl FullPreserve {
    pub fn new() -> Self {
        Self::default()
    }

    fn copy_book(&mut self, source: &SourceBook, table: &PathRemapTable, book: &mut MergedBook) -> Result<()> {
        let rewriter = ReferenceRewriter::new(table);
        let mut copied = CopiedBook {
            namespace: source.id.namespace.clone(),
            documents: Vec::new(),
        };

        for item in source.manifest() {
            let Some(entry) = source.entry_path(&item.href) else {
                return Err(EpubError::content_read(&source.path.join(&item.href), "路径超出压缩包根目录"));
            };
            let Some(href) = table.lookup_entry(&source.id, &entry) else {
                return Err(EpubError::content_read(&source.path.join(&entry), "路径未登记"));
            };
            let href = href.to_string();

            let payload = if item.is_xhtml() {
                let content = source.read_entry(&entry)?;
                Payload::Bytes(rewriter.rewrite(&content, &source.id, &entry))
            } else {
                let archive_path = path::decode_href(&entry);
                let file = source.staged_file(&archive_path);
                if !file.is_file() {
                    return Err(EpubError::content_read(&source.path.join(archive_path), "文件不存在"));
                }
                Payload::File(file)
            };

            let id = book.next_item_id();
            let mut merged = ManifestItem::new(id.clone(), href.clone(), item.media_type.clone());
            merged.properties = item.properties_without(EXCLUSIVE_PROPERTIES);

            if item.is_xhtml() {
                copied.documents.push((id.clone(), href.clone()));
            }
            tracing::debug!("{} -> {} ({})", item.href, href, id);

            book.manifest.insert(MergedItem {
                item: merged,
                payload,
                origin: Some(source.id.clone()),
            })?;
        }

        if copied.documents.is_empty() {
            tracing::warn!("{} 中没有XHTML内容文档, 不会出现在目录中", source.path.display());
        }
        self.copied.push(copied);
        Ok(())
    }
}

impl MergeStrategy for FullPreserve {
    fn rewrite_and_rename(&mut self, sources: &[SourceBook], table: &PathRemapTable, book: &mut MergedBook) -> Result<()> {
        for source in sources {
            self.copy_book(source, table, book)?;
        }
        Ok(())
    }

    fn assemble(&mut self, book: &mut MergedBook) -> Result<()> {
        book.spine.push(NAV_ID.to_string());
        for copied in &self.copied {
            book.spine.extend(copied.documents.iter().map(|(id, _)| id.clone()));
            if let Some((_, first)) = copied.documents.first() {
                book.push_navigation(copied.namespace.clone(), first.clone());
            }
        }
        Ok(())
    }
}
