//! NCX（Navigation Control file for XML）文件模块
//!
//! 此模块提供NCX导航控制文件的解析与生成，包括导航地图、页面列表等信息。
//! 合并后的书同时带有EPUB 3导航文档和NCX，后者供只认识EPUB 2的阅读器使用。

mod builder;
pub mod navigation;
pub mod parser;

pub use builder::NcxBuilder;
pub use navigation::{
    DocTitle, NavContent, NavLabel, NavMap, NavPoint, NavigationEntry, NcxMetadata, PageList, PageTarget,
};
pub use parser::Ncx;
