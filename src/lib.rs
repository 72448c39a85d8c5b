pub mod config;
pub mod epub;
pub mod merge;

// === 核心API重新导出 ===

/// 合并器（主要接口）
pub use merge::{MergeStage, MergeSummary, Merger};

/// 合并配置
pub use config::{MergeConfig, Strategy};

/// 错误处理
pub use epub::{EpubError, Result};

// === 底层组件（高级用法） ===

/// 源书读取与EPUB写出
pub use epub::{BookId, OcfWriter, SourceBook, Staging};

/// 容器组件
pub use epub::{Container, RootFile};

/// OPF组件
pub use epub::{Creator, Identifier, ManifestItem, Metadata, Opf, OpfBuilder, PackageMetadata, SpineItem};

/// NCX与导航文档组件
pub use epub::{DocTitle, NavBuilder, NavMap, NavPoint, NavigationEntry, Ncx, NcxBuilder, PageList};

/// 合并中间结构
pub use merge::{MergedBook, PathRemapTable};

// === 库信息 ===

/// 库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库的描述
pub const DESCRIPTION: &str = "把多个EPUB文件合并为一个";

// === 便捷函数 ===

/// 使用给定配置合并EPUB文件
///
/// 这是 `Merger::new(config).merge(inputs, output)` 的便捷包装函数。
///
/// # 参数
/// * `inputs` - 源EPUB文件路径，按阅读顺序排列
/// * `output` - 输出文件名
/// * `config` - 合并配置
///
/// # 示例
///
/// ```rust,no_run
/// use epubmerge::MergeConfig;
///
/// let summary = epubmerge::merge(&["上册.epub", "下册.epub"], "全集.epub", MergeConfig::default())?;
/// println!("{}", summary.message());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn merge<P, O>(inputs: &[P], output: O, config: MergeConfig) -> Result<MergeSummary>
where
    P: AsRef<std::path::Path>,
    O: AsRef<std::path::Path>,
{
    merge::merge(inputs, output, config)
}

/// 快速打开一个EPUB文件用于查看
///
/// 文件解压到`staging`中一个新的子目录，返回的[`SourceBook`]只在`staging`存在期间可以读取内容。
/// 同一个`staging`可以依次打开多个文件，彼此不会混在一起。
pub fn open<P: AsRef<std::path::Path>>(path: P, staging: &Staging) -> Result<SourceBook> {
    let path = path.as_ref();
    let namespace = path
        .file_stem()
        .map(|s| epub::path::namespace_token(&s.to_string_lossy()))
        .unwrap_or_else(|| "book".to_string());
    SourceBook::open(path, BookId::new(staging.unused_index(), namespace), staging)
}
