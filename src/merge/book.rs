//! 合并结果的数据结构
//!
//! [`MergedBook`]只在一次合并中存在：合并过程独占地修改它，写出后即被丢弃。
//! 页码计数和“只复制一次样式表”的状态也放在这里，而不是全局变量。

use std::collections::HashSet;
use std::path::PathBuf;

use crate::epub::BookId;
use crate::epub::error::{EpubError, Result};
use crate::epub::ncx::NavigationEntry;
use crate::epub::opf::{ManifestItem, NAV_ID, PackageMetadata};

/// 清单项的内容
#[derive(Debug, Clone)]
pub enum Payload {
    /// 已在内存中的内容（改写过的文档、生成的页面）
    Bytes(Vec<u8>),
    /// 暂存目录中的文件，写出时才读取
    File(PathBuf),
}

/// 合并后清单中的一项，路径已换算到合并后的命名空间
#[derive(Debug, Clone)]
pub struct MergedItem {
    pub item: ManifestItem,
    pub payload: Payload,
    /// 来源书籍；生成的页面没有单一来源时为`None`
    pub origin: Option<BookId>,
}

/// ID和路径都唯一的有序清单
#[derive(Debug, Default)]
pub struct MergedManifest {
    items: Vec<MergedItem>,
    ids: HashSet<String>,
    hrefs: HashSet<String>,
}

impl MergedManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加清单项，ID或路径重复时返回错误
    pub fn insert(&mut self, item: MergedItem) -> Result<()> {
        if item.item.id == NAV_ID || self.ids.contains(&item.item.id) {
            return Err(EpubError::DuplicateManifestEntry(format!("ID {}", item.item.id)));
        }
        if self.hrefs.contains(&item.item.href) {
            return Err(EpubError::DuplicateManifestEntry(format!("路径 {}", item.item.href)));
        }
        self.ids.insert(item.item.id.clone());
        self.hrefs.insert(item.item.href.clone());
        self.items.push(item);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedItem> {
        self.items.iter()
    }

    /// 只含清单信息的视图，用于生成OPF
    pub fn manifest_items(&self) -> impl Iterator<Item = &ManifestItem> {
        self.items.iter().map(|merged| &merged.item)
    }
}

/// 一次合并的全部结果
#[derive(Debug)]
pub struct MergedBook {
    pub identifier: String,
    pub title: String,
    pub language: String,
    pub creators: Vec<String>,
    pub manifest: MergedManifest,
    /// 阅读顺序（清单项ID）
    pub spine: Vec<String>,
    pub navigation: Vec<NavigationEntry>,
    /// 规整为单页模式时已生成的页数
    pub page_count: u32,
    /// 规整为单页模式时选定的共享样式表（合并后的路径）
    pub stylesheet: Option<String>,
    next_item: usize,
}

impl MergedBook {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            language: language.into(),
            creators: Vec::new(),
            manifest: MergedManifest::new(),
            spine: Vec::new(),
            navigation: Vec::new(),
            page_count: 0,
            stylesheet: None,
            next_item: 0,
        }
    }

    /// 分配下一个清单项ID（`item-0001`、`item-0002`……）
    pub fn next_item_id(&mut self) -> String {
        self.next_item += 1;
        format!("item-{:04}", self.next_item)
    }

    /// 页码加一并返回新页码
    pub fn next_page(&mut self) -> u32 {
        self.page_count += 1;
        self.page_count
    }

    /// 追加目录项，playOrder按追加顺序从1开始
    pub fn push_navigation(&mut self, label: impl Into<String>, target: impl Into<String>) -> u32 {
        let play_order = self.navigation.len() as u32 + 1;
        self.navigation.push(NavigationEntry::new(label, target, play_order));
        play_order
    }

    /// 记录作者，忽略重复
    pub fn add_creator(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && !self.creators.iter().any(|c| c == name) {
            self.creators.push(name.to_string());
        }
    }

    /// 写入包文件的阅读顺序；为空时以导航文档充当唯一的脊柱项
    pub fn package_spine(&self) -> Vec<String> {
        if self.spine.is_empty() {
            vec![NAV_ID.to_string()]
        } else {
            self.spine.clone()
        }
    }

    pub fn package_metadata(&self, modified: String) -> PackageMetadata {
        PackageMetadata {
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            language: self.language.clone(),
            creators: self.creators.clone(),
            modified,
        }
    }
}
