//! OPF（Open Packaging Format）文件模块
//!
//! 此模块提供EPUB包文件的解析与生成，包括元数据、清单、脊柱等信息。

mod builder;
mod manifest;
mod metadata;
mod parser;
mod spine;

pub use builder::{NAV_ID, NCX_ID, OpfBuilder, PackageMetadata};
pub use manifest::{CSS_MEDIA_TYPE, JPEG_MEDIA_TYPE, ManifestItem, NCX_MEDIA_TYPE, XHTML_MEDIA_TYPE};
pub use metadata::{Creator, DublinCore, Identifier, MetaValue, Metadata};
pub use parser::Opf;
pub use spine::SpineItem;
