use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpubError>;

/// EPUB读取、合并与写出过程中的错误类型
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("container.xml格式错误: {0}")]
    MalformedContainer(String),

    #[error("container.xml中没有找到rootfile条目: {0}")]
    MissingRootfile(String),

    #[error("OPF文件解析错误: {0}")]
    PackageParse(String),

    #[error("NCX文件解析错误: {0}")]
    NcxParse(String),

    #[error("无法读取资源文件 {}: {reason}", .path.display())]
    ContentRead { path: PathBuf, reason: String },

    #[error("无法打开EPUB文件 {}: {reason}", .path.display())]
    ArchiveRead { path: PathBuf, reason: String },

    #[error("保存文件 {} 时出错: {reason}", .path.display())]
    ZipWrite { path: PathBuf, reason: String },

    #[error("清单中存在重复条目: {0}")]
    DuplicateManifestEntry(String),

    #[error("请先添加要合并的 EPUB 文件。")]
    NoSources,

    #[error("输出文件名不能为空。")]
    InvalidOutputName,

    #[error("配置文件错误: {0}")]
    ConfigError(String),
}

impl EpubError {
    /// 为解析类错误附加出错的源文件路径
    ///
    /// 解析container.xml和OPF时并不知道它们来自哪个EPUB文件，
    /// 由打开源文件的一方补充上下文。已带路径的错误原样返回。
    pub fn in_source(self, source: &Path) -> Self {
        let prefix = |msg: String| format!("{}: {}", source.display(), msg);
        match self {
            EpubError::MalformedContainer(msg) => EpubError::MalformedContainer(prefix(msg)),
            EpubError::MissingRootfile(msg) => EpubError::MissingRootfile(prefix(msg)),
            EpubError::PackageParse(msg) => EpubError::PackageParse(prefix(msg)),
            EpubError::DuplicateManifestEntry(msg) => EpubError::DuplicateManifestEntry(prefix(msg)),
            EpubError::XmlError(err) => EpubError::PackageParse(prefix(err.to_string())),
            other => other,
        }
    }

    /// 把任意错误包装为写出失败
    pub(crate) fn zip_write(path: &Path, reason: impl ToString) -> Self {
        EpubError::ZipWrite {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn archive_read(path: &Path, reason: impl ToString) -> Self {
        EpubError::ArchiveRead {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn content_read(path: &Path, reason: impl ToString) -> Self {
        EpubError::ContentRead {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_source_prefixes_parse_errors() {
        let err = EpubError::MissingRootfile("没有找到任何rootfile条目".to_string())
            .in_source(Path::new("books/a.epub"));
        match err {
            EpubError::MissingRootfile(msg) => {
                assert!(msg.starts_with("books/a.epub"));
                assert!(msg.contains("rootfile"));
            }
            other => panic!("期望MissingRootfile错误, 实际: {:?}", other),
        }
    }

    #[test]
    fn test_in_source_keeps_path_carrying_errors() {
        let err = EpubError::archive_read(Path::new("x.epub"), "bad zip").in_source(Path::new("y.epub"));
        match err {
            EpubError::ArchiveRead { path, .. } => assert_eq!(path, PathBuf::from("x.epub")),
            other => panic!("期望ArchiveRead错误, 实际: {:?}", other),
        }
    }

    #[test]
    fn test_display_names_the_file() {
        let err = EpubError::archive_read(Path::new("broken.epub"), "invalid Zip archive");
        assert!(err.to_string().contains("broken.epub"));
    }
}
