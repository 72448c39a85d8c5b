use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::epub::container::{CONTAINER_PATH, Container};
use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{ManifestItem, Metadata, Opf, SpineItem};
use crate::epub::path;
use crate::epub::staging::Staging;

const EPUB_MIMETYPE: &str = "application/epub+zip";

/// 源书的身份：在输入列表中的位置和由文件名得到的命名空间
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookId {
    /// 在输入列表中的位置（从0开始）
    pub index: usize,
    /// 合并后该书所有资源所在的目录名
    pub namespace: String,
}

impl BookId {
    pub fn new(index: usize, namespace: impl Into<String>) -> Self {
        Self {
            index,
            namespace: namespace.into(),
        }
    }
}

/// 一本已解析的源EPUB
///
/// 打开时压缩包被完整解压到暂存目录，随后关闭压缩包；
/// 清单项的内容在需要时才从暂存目录读取。
#[derive(Debug)]
pub struct SourceBook {
    pub id: BookId,
    /// 源文件路径
    pub path: PathBuf,
    /// 包文件在压缩包中的路径
    pub opf_path: String,
    pub opf: Opf,
    root: PathBuf,
}

impl SourceBook {
    /// 打开并解析一个EPUB文件
    ///
    /// # 参数
    /// * `path` - epub文件的路径
    /// * `id` - 该书在本次合并中的身份
    /// * `staging` - 本次合并的暂存目录
    pub fn open<P: AsRef<Path>>(path: P, id: BookId, staging: &Staging) -> Result<SourceBook> {
        let path = path.as_ref();
        let root = staging.book_dir(id.index);

        Self::extract(path, &root)?;
        Self::validate_mimetype(path, &root);

        let container = Self::read_container(path, &root)?;
        let opf_path = container.get_opf_path().ok_or_else(|| {
            EpubError::MissingRootfile("container.xml中没有找到有效的rootfile".to_string()).in_source(path)
        })?;

        let opf_file = root.join(path::decode_href(&opf_path));
        let opf_bytes = fs::read(&opf_file).map_err(|e| EpubError::content_read(&path.join(&opf_path), e))?;
        let opf = Opf::parse(&opf_bytes).map_err(|e| e.in_source(path))?;

        tracing::info!(
            "已打开 {} (命名空间 {}): {} 个清单项, {} 个脊柱项",
            path.display(),
            id.namespace,
            opf.manifest.len(),
            opf.spine.len()
        );

        Ok(SourceBook {
            id,
            path: path.to_path_buf(),
            opf_path,
            opf,
            root,
        })
    }

    /// 把压缩包中的全部条目解压到`dest`
    fn extract(path: &Path, dest: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| EpubError::archive_read(path, e))?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| EpubError::archive_read(path, e))?;
        fs::create_dir_all(dest).map_err(|e| EpubError::archive_read(path, e))?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| EpubError::archive_read(path, e))?;
            let Some(relative) = entry.enclosed_name() else {
                tracing::warn!("{}: 跳过不安全的条目 {}", path.display(), entry.name());
                continue;
            };
            let target = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|e| EpubError::archive_read(path, e))?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| EpubError::archive_read(path, e))?;
            }
            let mut out = File::create(&target).map_err(|e| EpubError::archive_read(path, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| EpubError::archive_read(path, e))?;
        }

        tracing::debug!("{} 共解压 {} 个条目", path.display(), archive.len());
        Ok(())
    }

    /// 检查mimetype文件，不符合时只记录警告
    fn validate_mimetype(path: &Path, root: &Path) {
        match fs::read_to_string(root.join("mimetype")) {
            Ok(content) if content.trim() == EPUB_MIMETYPE => {}
            Ok(content) => tracing::warn!(
                "{}: mimetype内容为 {:?}, 应为 {}",
                path.display(),
                content.trim(),
                EPUB_MIMETYPE
            ),
            Err(_) => tracing::warn!("{}: 缺少mimetype文件", path.display()),
        }
    }

    fn read_container(path: &Path, root: &Path) -> Result<Container> {
        let container_file = root.join(CONTAINER_PATH);
        let mut content = Vec::new();
        match File::open(&container_file) {
            Ok(mut file) => {
                file.read_to_end(&mut content)
                    .map_err(|e| EpubError::content_read(&path.join(CONTAINER_PATH), e))?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(EpubError::MissingRootfile(format!("缺少{}", CONTAINER_PATH)).in_source(path));
            }
            Err(e) => return Err(EpubError::content_read(&path.join(CONTAINER_PATH), e)),
        }

        let text = String::from_utf8_lossy(&content);
        Container::parse_xml(text.trim_start_matches('\u{feff}')).map_err(|e| e.in_source(path))
    }

    /// 获取OPF文件所在的目录
    pub fn opf_dir(&self) -> &str {
        path::parent_dir(&self.opf_path)
    }

    pub fn manifest(&self) -> &[ManifestItem] {
        &self.opf.manifest
    }

    pub fn spine(&self) -> &[SpineItem] {
        &self.opf.spine
    }

    pub fn metadata(&self) -> &Metadata {
        &self.opf.metadata
    }

    /// 把清单中的href换算为压缩包内的路径（保留href的编码形式）
    ///
    /// href可以用`..`指向OPF目录之外，只要仍在压缩包内；越出压缩包根目录时返回`None`。
    pub fn entry_path(&self, href: &str) -> Option<String> {
        path::resolve(self.opf_dir(), href)
    }

    /// 压缩包内的条目（已解码的文件名）在暂存目录中的位置
    pub fn staged_file(&self, archive_path: &str) -> PathBuf {
        self.root.join(archive_path)
    }

    /// 读取压缩包内的条目（编码形式的路径，如[`SourceBook::entry_path`]的返回值）
    pub fn read_entry(&self, entry: &str) -> Result<Vec<u8>> {
        let archive_path = path::decode_href(entry);
        fs::read(self.staged_file(&archive_path)).map_err(|e| EpubError::content_read(&self.path.join(&archive_path), e))
    }

    /// 相对于OPF目录的资源路径在暂存目录中的位置
    pub fn resource_file(&self, package_path: &str) -> PathBuf {
        let entry = path::join(self.opf_dir(), &path::decode_href(package_path));
        self.root.join(entry)
    }

    /// 读取相对于OPF目录的资源
    pub fn read_resource(&self, package_path: &str) -> Result<Vec<u8>> {
        fs::read(self.resource_file(package_path)).map_err(|e| {
            let entry = path::join(self.opf_dir(), &path::decode_href(package_path));
            EpubError::content_read(&self.path.join(entry), e)
        })
    }

    /// 读取清单项的内容
    pub fn read_item(&self, item: &ManifestItem) -> Result<Vec<u8>> {
        self.read_resource(&item.href)
    }

    /// 按清单顺序获取所有XHTML内容文档
    pub fn content_documents(&self) -> impl Iterator<Item = &ManifestItem> {
        self.opf.content_documents()
    }

    /// 获取书籍的基本信息 (书名, 作者列表)
    pub fn get_book_info(&self) -> (String, Vec<String>) {
        let title = self
            .metadata()
            .title()
            .unwrap_or_else(|| "未知标题".to_string());
        let authors = self
            .metadata()
            .creators()
            .into_iter()
            .map(|creator| creator.name)
            .collect();
        (title, authors)
    }
}
