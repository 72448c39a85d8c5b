//! EPUB合并模块
//!
//! [`Merger`]按输入顺序逐本打开源书，建立路径重映射表，由选定的策略生成合并后的
//! 清单、阅读顺序和目录，最后写出新的EPUB文件。任一阶段出错都会中止整个合并，
//! 临时目录随之删除，输出位置不会留下不完整的文件。

pub mod book;
pub mod full;
pub mod pages;
pub mod remap;
pub mod rewrite;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{MergeConfig, Strategy};
use crate::epub::error::{EpubError, Result};
use crate::epub::nav::NavBuilder;
use crate::epub::ncx::NcxBuilder;
use crate::epub::opf::OpfBuilder;
use crate::epub::path;
use crate::epub::reader::{BookId, SourceBook};
use crate::epub::staging::Staging;
use crate::epub::writer::OcfWriter;

pub use book::{MergedBook, MergedItem, MergedManifest, Payload};
pub use full::FullPreserve;
pub use pages::PageNormalize;
pub use remap::PathRemapTable;
pub use rewrite::ReferenceRewriter;

/// 合并后所有内容所在的目录
pub const PACKAGE_DIR: &str = "OEBPS";
/// 包文件（相对于[`PACKAGE_DIR`]）
pub const PACKAGE_HREF: &str = "content.opf";
/// 导航文档（相对于[`PACKAGE_DIR`]）
pub const NAV_HREF: &str = "nav.xhtml";
/// NCX（相对于[`PACKAGE_DIR`]）
pub const NCX_HREF: &str = "toc.ncx";

/// 合并策略的两个阶段
pub trait MergeStrategy {
    /// 把源书内容换算到合并后的命名空间并加入清单
    fn rewrite_and_rename(&mut self, sources: &[SourceBook], table: &PathRemapTable, book: &mut MergedBook) -> Result<()>;

    /// 组装阅读顺序和目录
    fn assemble(&mut self, book: &mut MergedBook) -> Result<()>;
}

/// 合并过程的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    Init,
    CollectSources,
    BuildRemapTable,
    RewriteAndRename,
    AssembleManifestSpineNav,
    Write,
    Done,
}

impl fmt::Display for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeStage::Init => "Init",
            MergeStage::CollectSources => "CollectSources",
            MergeStage::BuildRemapTable => "BuildRemapTable",
            MergeStage::RewriteAndRename => "RewriteAndRename",
            MergeStage::AssembleManifestSpineNav => "AssembleManifestSpineNav",
            MergeStage::Write => "Write",
            MergeStage::Done => "Done",
        };
        f.write_str(name)
    }
}

/// 一次成功合并的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// 实际写出的文件路径
    pub output: PathBuf,
    pub strategy: Strategy,
    /// 源书数量
    pub books: usize,
    /// 合并后清单项数量（不含生成的导航文档和NCX）
    pub items: usize,
    /// 单页规整模式下的页数
    pub pages: u32,
}

impl MergeSummary {
    /// 提示给用户的成功信息
    pub fn message(&self) -> String {
        format!("文件已成功合并并保存为: {}", self.output.display())
    }
}

/// 规整输出文件名：去掉首尾空白，缺少`.epub`后缀时补上
pub fn normalize_output_name(output: &Path) -> Result<PathBuf> {
    let raw = output.to_string_lossy();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EpubError::InvalidOutputName);
    }

    let path = PathBuf::from(trimmed);
    match path.file_name() {
        None => Err(EpubError::InvalidOutputName),
        Some(name) if name.to_string_lossy().to_lowercase().ends_with(".epub") => Ok(path),
        Some(_) => Ok(PathBuf::from(format!("{}.epub", trimmed))),
    }
}

/// EPUB合并器
#[derive(Debug, Clone, Default)]
pub struct Merger {
    config: MergeConfig,
    staging_root: Option<PathBuf>,
}

impl Merger {
    pub fn new(config: MergeConfig) -> Self {
        Self {
            config,
            staging_root: None,
        }
    }

    /// 在指定目录下创建临时解压目录，默认使用系统临时目录
    pub fn with_staging_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.staging_root = Some(root.as_ref().to_path_buf());
        self
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// 按输入顺序合并`inputs`并写出到`output`
    ///
    /// # 参数
    /// * `inputs` - 源EPUB文件，顺序决定阅读顺序和页码
    /// * `output` - 输出文件名，缺少`.epub`后缀时自动补上
    ///
    /// # 示例
    ///
    /// ```rust,no_run
    /// use epubmerge::{MergeConfig, Merger};
    /// let summary = Merger::new(MergeConfig::default()).merge(&["a.epub", "b.epub"], "合集")?;
    /// println!("{}", summary.message());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn merge<P, O>(&self, inputs: &[P], output: O) -> Result<MergeSummary>
    where
        P: AsRef<Path>,
        O: AsRef<Path>,
    {
        if inputs.is_empty() {
            return Err(EpubError::NoSources);
        }
        let output = normalize_output_name(output.as_ref())?;

        tracing::info!(
            "开始合并 {} 个文件 -> {} (策略: {})",
            inputs.len(),
            output.display(),
            self.config.strategy
        );

        let mut stage = MergeStage::Init;
        match self.run(inputs, &output, &mut stage) {
            Ok(summary) => {
                tracing::info!("{}", summary.message());
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Failed({}: {})", stage, e);
                Err(e)
            }
        }
    }

    fn run<P: AsRef<Path>>(&self, inputs: &[P], output: &Path, stage: &mut MergeStage) -> Result<MergeSummary> {
        let staging = match &self.staging_root {
            Some(root) => Staging::new_in(root)?,
            None => Staging::new()?,
        };

        Self::enter(stage, MergeStage::CollectSources);
        let namespaces = remap::namespaces_for(inputs);
        let mut sources = Vec::with_capacity(inputs.len());
        for (index, (input, namespace)) in inputs.iter().zip(namespaces).enumerate() {
            let id = BookId::new(index, namespace);
            sources.push(SourceBook::open(input, id, &staging)?);
        }

        Self::enter(stage, MergeStage::BuildRemapTable);
        let table = PathRemapTable::build(&sources);
        tracing::debug!("路径映射表共 {} 条", table.len());

        Self::enter(stage, MergeStage::RewriteAndRename);
        let mut book = MergedBook::new(
            self.config.resolve_identifier(),
            self.config.title.clone(),
            self.config.language.clone(),
        );
        for source in &sources {
            for creator in source.metadata().creators() {
                book.add_creator(&creator.name);
            }
        }
        let mut strategy: Box<dyn MergeStrategy> = match self.config.strategy {
            Strategy::FullPreserve => Box::new(FullPreserve::new()),
            Strategy::PageNormalize => Box::new(PageNormalize::new()),
        };
        strategy.rewrite_and_rename(&sources, &table, &mut book)?;

        Self::enter(stage, MergeStage::AssembleManifestSpineNav);
        strategy.assemble(&mut book)?;

        Self::enter(stage, MergeStage::Write);
        write_merged(&book, output)?;

        Self::enter(stage, MergeStage::Done);
        if let Err(e) = staging.close() {
            tracing::warn!("删除临时目录失败: {}", e);
        }

        Ok(MergeSummary {
            output: output.to_path_buf(),
            strategy: self.config.strategy,
            books: sources.len(),
            items: book.manifest.len(),
            pages: book.page_count,
        })
    }

    fn enter(stage: &mut MergeStage, next: MergeStage) {
        tracing::debug!("{} -> {}", stage, next);
        *stage = next;
    }
}

/// 把合并结果写出为EPUB文件，返回写入的条目数
pub fn write_merged(book: &MergedBook, output: &Path) -> Result<usize> {
    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let metadata = book.package_metadata(modified);

    let opf = OpfBuilder::new(&metadata, NAV_HREF, NCX_HREF).build(book.manifest.manifest_items(), &book.package_spine())?;
    let ncx = NcxBuilder::new(&book.identifier, &book.title, &book.language).build(&book.navigation, book.page_count)?;
    let nav = NavBuilder::new(&book.title, &book.language, NAV_HREF).build(&book.navigation, book.page_count > 0)?;

    let package_path = path::join(PACKAGE_DIR, PACKAGE_HREF);
    let mut writer = OcfWriter::create(output, &package_path)?;
    writer.add_bytes(&package_path, &opf)?;
    writer.add_bytes(&path::join(PACKAGE_DIR, NAV_HREF), &nav)?;
    writer.add_bytes(&path::join(PACKAGE_DIR, NCX_HREF), &ncx)?;

    for merged in book.manifest.iter() {
        let name = path::join(PACKAGE_DIR, &path::decode_href(&merged.item.href));
        match &merged.payload {
            Payload::Bytes(bytes) => writer.add_bytes(&name, bytes)?,
            Payload::File(file) => writer.add_file(&name, file)?,
        }
    }

    writer.finish()
}

/// 使用给定配置合并EPUB文件
pub fn merge<P, O>(inputs: &[P], output: O, config: MergeConfig) -> Result<MergeSummary>
where
    P: AsRef<Path>,
    O: AsRef<Path>,
{
    Merger::new(config).merge(inputs, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name_normalization() {
        assert_eq!(normalize_output_name(Path::new("合集")).unwrap(), PathBuf::from("合集.epub"));
        assert_eq!(normalize_output_name(Path::new("  out.EPUB ")).unwrap(), PathBuf::from("out.EPUB"));
        assert_eq!(normalize_output_name(Path::new("dir/out")).unwrap(), PathBuf::from("dir/out.epub"));
        assert!(matches!(normalize_output_name(Path::new("   ")), Err(EpubError::InvalidOutputName)));
        assert!(matches!(normalize_output_name(Path::new("")), Err(EpubError::InvalidOutputName)));
    }

    #[test]
    fn test_no_sources_checked_first() {
        let inputs: [&str; 0] = [];
        let result = Merger::default().merge(&inputs, "");
        assert!(matches!(result, Err(EpubError::NoSources)));
    }

    #[test]
    fn test_summary_message() {
        let summary = MergeSummary {
            output: PathBuf::from("合并后的文件.epub"),
            strategy: Strategy::FullPreserve,
            books: 2,
            items: 10,
            pages: 0,
        };
        assert_eq!(summary.message(), "文件已成功合并并保存为: 合并后的文件.epub");
    }
}
