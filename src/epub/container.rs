use crate::epub::error::{EpubError, Result};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// container.xml在压缩包中的固定位置
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// OPF包文件的媒体类型
pub const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// Container.xml中的rootfile信息
#[derive(Debug, Clone, PartialEq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// Container.xml的解析结果
#[derive(Debug, Clone)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

impl Container {
    /// 解析container.xml内容
    ///
    /// XML本身不合法时返回`MalformedContainer`，
    /// 合法但没有任何rootfile条目时返回`MissingRootfile`。
    pub fn parse_xml(xml_content: &str) -> Result<Container> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;

        let mut rootfiles = Vec::new();
        let mut buf = Vec::new();
        let mut in_rootfiles = false;
        let mut depth = 0usize;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| EpubError::MalformedContainer(e.to_string()))?;
            match event {
                Event::Start(ref e) => {
                    depth += 1;
                    match e.local_name().as_ref() {
                        b"rootfiles" => {
                            in_rootfiles = true;
                        }
                        b"rootfile" if in_rootfiles => {
                            if let Some(rootfile) = Self::parse_rootfile(e)? {
                                rootfiles.push(rootfile);
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    depth = depth.saturating_sub(1);
                    if e.local_name().as_ref() == b"rootfiles" {
                        in_rootfiles = false;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if depth != 0 {
            return Err(EpubError::MalformedContainer("XML元素没有正确闭合".to_string()));
        }

        if rootfiles.is_empty() {
            return Err(EpubError::MissingRootfile("没有找到任何rootfile条目".to_string()));
        }

        Ok(Container { rootfiles })
    }

    fn parse_rootfile(e: &BytesStart) -> Result<Option<RootFile>> {
        let mut full_path = String::new();
        let mut media_type = String::new();

        for attr_result in e.attributes() {
            let attr = attr_result.map_err(|e| EpubError::MalformedContainer(e.to_string()))?;
            match attr.key.local_name().as_ref() {
                b"full-path" => {
                    full_path = String::from_utf8_lossy(&attr.value).to_string();
                }
                b"media-type" => {
                    media_type = String::from_utf8_lossy(&attr.value).to_string();
                }
                _ => {}
            }
        }

        if full_path.is_empty() {
            return Ok(None);
        }
        Ok(Some(RootFile {
            full_path,
            media_type,
        }))
    }

    /// 获取主要的OPF文件路径
    ///
    /// 优先使用第一个`application/oebps-package+xml`类型的rootfile，
    /// 没有时退回到第一个rootfile。
    pub fn get_opf_path(&self) -> Option<String> {
        self.rootfiles
            .iter()
            .find(|rootfile| rootfile.media_type == PACKAGE_MEDIA_TYPE)
            .or_else(|| self.rootfiles.first())
            .map(|rootfile| rootfile.full_path.clone())
    }

    /// 生成只包含一个rootfile的container.xml
    pub fn build_xml(opf_path: &str) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("container").with_attributes([
            ("version", "1.0"),
            ("xmlns", "urn:oasis:names:tc:opendocument:xmlns:container"),
        ])))?;
        writer.write_event(Event::Start(BytesStart::new("rootfiles")))?;
        writer.write_event(Event::Empty(BytesStart::new("rootfile").with_attributes([
            ("full-path", opf_path),
            ("media-type", PACKAGE_MEDIA_TYPE),
        ])))?;
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("rootfiles")))?;
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("container")))?;
        Ok(writer.into_inner())
    }
}
