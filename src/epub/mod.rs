pub mod error;
pub mod container;
pub mod reader;
pub mod writer;
pub mod staging;
pub mod path;
pub mod nav;
pub mod opf;
pub mod ncx;

// 重新导出错误处理
pub use error::{EpubError, Result};

// 重新导出容器相关
pub use container::{Container, RootFile};

// 重新导出读写
pub use reader::{BookId, SourceBook};
pub use staging::Staging;
pub use writer::OcfWriter;

// 重新导出OPF相关
pub use opf::{
    Creator,
    Identifier,
    ManifestItem,
    Metadata,
    Opf,
    OpfBuilder,
    PackageMetadata,
    SpineItem,
};

// 重新导出NCX与导航文档
pub use nav::NavBuilder;
pub use ncx::{
    DocTitle,
    NavMap,
    NavPoint,
    NavigationEntry,
    Ncx,
    NcxBuilder,
    PageList,
};
