//! 合并过程使用的临时解压目录
//!
//! 每次合并创建一个新的临时目录，源文件逐本解压到其中的子目录。
//! 目录随`Staging`被drop而删除，无论合并成功、出错返回还是panic展开。

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::epub::error::Result;

const STAGING_PREFIX: &str = "epubmerge-";

/// 一次合并独占的临时目录
#[derive(Debug)]
pub struct Staging {
    dir: TempDir,
}

impl Staging {
    /// 在系统临时目录下创建新的暂存目录
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir()?;
        tracing::debug!("创建临时目录: {}", dir.path().display());
        Ok(Self { dir })
    }

    /// 在指定目录下创建暂存目录（测试中用来检查清理情况）
    pub fn new_in<P: AsRef<Path>>(parent: P) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// 第`index`本源书的解压目录
    pub fn book_dir(&self, index: usize) -> PathBuf {
        self.dir.path().join(format!("book-{:03}", index))
    }

    /// 还没有解压目录的最小源书序号
    pub fn unused_index(&self) -> usize {
        (0..).find(|&index| !self.book_dir(index).exists()).unwrap_or_default()
    }

    /// 显式删除临时目录并报告删除失败
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!("已删除临时目录: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let staging = Staging::new_in(parent.path()).unwrap();
            std::fs::create_dir_all(staging.book_dir(0)).unwrap();
            std::fs::write(staging.book_dir(0).join("a.txt"), b"x").unwrap();
            staging.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_staging_close() {
        let parent = tempfile::tempdir().unwrap();
        let staging = Staging::new_in(parent.path()).unwrap();
        let path = staging.path().to_path_buf();
        assert!(path.exists());
        staging.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_book_dirs_are_distinct() {
        let staging = Staging::new().unwrap();
        assert_ne!(staging.book_dir(0), staging.book_dir(1));
        assert!(staging.book_dir(3).starts_with(staging.path()));
    }

    #[test]
    fn test_unused_index_skips_extracted_books() {
        let staging = Staging::new().unwrap();
        assert_eq!(staging.unused_index(), 0);
        std::fs::create_dir_all(staging.book_dir(0)).unwrap();
        std::fs::create_dir_all(staging.book_dir(2)).unwrap();
        assert_eq!(staging.unused_index(), 1);
    }
}
