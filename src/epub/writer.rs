//! OCF容器写出
//!
//! 内容先写入输出文件同目录下的临时文件，全部成功后再原子地移动到目标位置，
//! 失败时临时文件随[`OcfWriter`]一同删除，不会留下写了一半的输出文件。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::epub::container::{CONTAINER_PATH, Container};
use crate::epub::error::{EpubError, Result};

/// 写入压缩包的mimetype内容
pub const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";

/// EPUB压缩包写出器
///
/// [`OcfWriter::create`]会先写入`mimetype`（不压缩）和`container.xml`，
/// 之后的条目一律使用Deflate压缩。
pub struct OcfWriter {
    output: PathBuf,
    zip: ZipWriter<BufWriter<File>>,
    temp_path: TempPath,
    entries: usize,
}

impl OcfWriter {
    /// 在`output`旁边创建临时文件并写入容器头部
    ///
    /// # 参数
    /// * `output` - 最终的输出路径
    /// * `package_path` - 包文件在压缩包中的路径，写入container.xml
    pub fn create(output: &Path, package_path: &str) -> Result<Self> {
        let parent = match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".epubmerge-")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|e| EpubError::zip_write(output, e))?;
        let (file, temp_path) = temp.into_parts();

        let mut writer = Self {
            output: output.to_path_buf(),
            zip: ZipWriter::new(BufWriter::new(file)),
            temp_path,
            entries: 0,
        };

        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_entry("mimetype", stored)?;
        writer.write_all(EPUB_MIMETYPE)?;

        let container = Container::build_xml(package_path)?;
        writer.add_bytes(CONTAINER_PATH, &container)?;

        tracing::debug!("开始写出 {} (临时文件 {})", output.display(), writer.temp_path.display());
        Ok(writer)
    }

    /// 添加内存中的条目
    pub fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.start_entry(name, Self::deflated())?;
        self.write_all(data)
    }

    /// 添加磁盘上的文件；源文件不存在时返回[`EpubError::ContentRead`]
    pub fn add_file(&mut self, name: &str, source: &Path) -> Result<()> {
        let mut file = File::open(source).map_err(|e| EpubError::content_read(source, e))?;
        self.start_entry(name, Self::deflated())?;
        io::copy(&mut file, &mut self.zip).map_err(|e| EpubError::zip_write(&self.output, e))?;
        Ok(())
    }

    /// 已写入的条目数（含mimetype和container.xml）
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// 完成压缩包并移动到输出位置，返回写入的条目数
    pub fn finish(self) -> Result<usize> {
        let output = self.output;
        let buffered = self.zip.finish().map_err(|e| EpubError::zip_write(&output, e))?;
        let file = buffered
            .into_inner()
            .map_err(|e| EpubError::zip_write(&output, e.error().to_string()))?;
        file.sync_all().map_err(|e| EpubError::zip_write(&output, e))?;
        drop(file);

        self.temp_path
            .persist(&output)
            .map_err(|e| EpubError::zip_write(&output, e.error))?;

        tracing::debug!("{} 写出完成, 共 {} 个条目", output.display(), self.entries);
        Ok(self.entries)
    }

    fn deflated() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated)
    }

    fn start_entry(&mut self, name: &str, options: SimpleFileOptions) -> Result<()> {
        self.zip
            .start_file(name, options)
            .map_err(|e| EpubError::zip_write(&self.output, e))?;
        self.entries += 1;
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.zip
            .write_all(data)
            .map_err(|e| EpubError::zip_write(&self.output, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_mimetype_first_and_stored() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.epub");

        let mut writer = OcfWriter::create(&output, "OEBPS/content.opf").unwrap();
        writer.add_bytes("OEBPS/content.opf", b"<package/>").unwrap();
        assert_eq!(writer.finish().unwrap(), 3);

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mut first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
        let mut content = Vec::new();
        first.read_to_end(&mut content).unwrap();
        assert_eq!(content, EPUB_MIMETYPE);
        drop(first);

        let second = archive.by_index(1).unwrap();
        assert_eq!(second.name(), CONTAINER_PATH);
        assert_eq!(second.compression(), zip::CompressionMethod::Deflated);
    }

    #[test]
    fn test_missing_source_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.epub");

        let mut writer = OcfWriter::create(&output, "OEBPS/content.opf").unwrap();
        let result = writer.add_file("OEBPS/a.jpg", &dir.path().join("missing.jpg"));
        assert!(matches!(result, Err(EpubError::ContentRead { .. })));
        drop(writer);

        assert!(!output.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.epub");
        std::fs::write(&output, b"old").unwrap();

        OcfWriter::create(&output, "content.opf").unwrap().finish().unwrap();

        let archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("no/such/dir/out.epub");
        assert!(matches!(
            OcfWriter::create(&output, "content.opf"),
            Err(EpubError::ZipWrite { .. })
        ));
    }
}
