//! NCX解析器模块
//!
//! 提供NCX（Navigation Control file for XML）文件的XML解析功能。

use crate::epub::error::{EpubError, Result};
use crate::epub::ncx::{
    DocTitle, NavContent, NavLabel, NavMap, NavPoint, NcxMetadata, PageList, PageTarget,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// NCX文件解析结果
#[derive(Debug, Clone)]
pub struct Ncx {
    pub version: String,
    pub xml_lang: Option<String>,
    pub metadata: NcxMetadata,
    pub doc_title: Option<DocTitle>,
    pub nav_map: NavMap,
    /// 页面列表（可选）
    pub page_list: Option<PageList>,
}

#[derive(PartialEq)]
enum Section {
    None,
    Head,
    DocTitle,
    NavMap,
    PageList,
}

impl Ncx {
    /// 解析NCX文件的原始字节
    pub fn parse(bytes: &[u8]) -> Result<Ncx> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| EpubError::NcxParse(format!("NCX文件不是有效的UTF-8: {}", e)))?;
        Self::parse_xml(text)
    }

    /// 解析NCX文件内容
    pub fn parse_xml(xml_content: &str) -> Result<Ncx> {
        Self::parse_events(xml_content.trim_start_matches('\u{feff}')).map_err(|e| match e {
            EpubError::XmlError(xml_err) => EpubError::NcxParse(xml_err.to_string()),
            other => other,
        })
    }

    fn parse_events(xml_content: &str) -> Result<Ncx> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;

        let mut version = String::new();
        let mut xml_lang = None;
        let mut metadata = NcxMetadata::new();
        let mut doc_title = None;
        let mut nav_map = NavMap::new();
        let mut page_list: Option<PageList> = None;

        let mut buf = Vec::new();
        let mut section = Section::None;
        let mut text_content = String::new();

        // 嵌套的导航点，栈顶是当前正在解析的导航点
        let mut nav_point_stack: Vec<NavPoint> = Vec::new();
        let mut current_page_list = PageList::new();
        let mut current_page_target: Option<PageTarget> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                    match (local_name.as_str(), &section) {
                        ("ncx", _) => {
                            version = Self::attribute(e, b"version")?.unwrap_or_default();
                            xml_lang = Self::attribute(e, b"lang")?;
                        }
                        ("head", _) => section = Section::Head,
                        ("docTitle", _) => section = Section::DocTitle,
                        ("navMap", _) => section = Section::NavMap,
                        ("pageList", _) => {
                            section = Section::PageList;
                            current_page_list = PageList::new();
                        }
                        ("meta", Section::Head) => {
                            Self::parse_meta_element(e, &mut metadata)?;
                        }
                        ("navPoint", Section::NavMap) => {
                            let play_order = Self::attribute(e, b"playOrder")?
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(0);
                            let mut nav_point = NavPoint::new(
                                Self::attribute(e, b"id")?.unwrap_or_default(),
                                play_order,
                                NavLabel::new(String::new()),
                                NavContent::new(String::new()),
                            );
                            nav_point.class = Self::attribute(e, b"class")?;
                            nav_point_stack.push(nav_point);
                        }
                        ("content", Section::NavMap) => {
                            if let Some(nav_point) = nav_point_stack.last_mut() {
                                nav_point.content = NavContent::new(Self::attribute(e, b"src")?.unwrap_or_default());
                            }
                        }
                        ("pageTarget", Section::PageList) => {
                            current_page_target = Some(PageTarget::new(
                                Self::attribute(e, b"id")?.unwrap_or_default(),
                                Self::attribute(e, b"type")?.unwrap_or_else(|| "normal".to_string()),
                                Self::attribute(e, b"value")?.unwrap_or_default(),
                                Self::attribute(e, b"playOrder")?
                                    .and_then(|v| v.parse().ok())
                                    .unwrap_or(0),
                                NavLabel::new(String::new()),
                                NavContent::new(String::new()),
                            ));
                        }
                        ("content", Section::PageList) => {
                            if let Some(target) = current_page_target.as_mut() {
                                target.content = NavContent::new(Self::attribute(e, b"src")?.unwrap_or_default());
                            }
                        }
                        _ => {}
                    }
                    text_content.clear();
                }
                Event::End(ref e) => {
                    let local_name_bytes = e.local_name();
                    let local_name = String::from_utf8_lossy(local_name_bytes.as_ref());

                    match (local_name.as_ref(), &section) {
                        ("head", _) | ("navMap", _) => section = Section::None,
                        ("docTitle", _) => {
                            doc_title = Some(DocTitle::new(text_content.trim().to_string()));
                            section = Section::None;
                        }
                        ("pageList", _) => {
                            if !current_page_list.page_targets.is_empty() {
                                page_list = Some(std::mem::take(&mut current_page_list));
                            }
                            section = Section::None;
                        }
                        ("text", Section::NavMap) => {
                            if let Some(nav_point) = nav_point_stack.last_mut() {
                                nav_point.nav_label = NavLabel::new(text_content.trim().to_string());
                            }
                        }
                        ("navPoint", Section::NavMap) => {
                            if let Some(nav_point) = nav_point_stack.pop() {
                                match nav_point_stack.last_mut() {
                                    Some(parent) => parent.add_child(nav_point),
                                    None => nav_map.add_nav_point(nav_point),
                                }
                            }
                        }
                        ("text", Section::PageList) => {
                            let text = text_content.trim().to_string();
                            if let Some(target) = current_page_target.as_mut() {
                                target.nav_label = NavLabel::new(text);
                            } else if current_page_list.nav_label.is_none() {
                                current_page_list.nav_label = Some(NavLabel::new(text));
                            }
                        }
                        ("pageTarget", Section::PageList) => {
                            if let Some(target) = current_page_target.take() {
                                current_page_list.add_page_target(target);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    text_content.push_str(&e.unescape()?);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        nav_map.sort_by_play_order();

        Ok(Ncx {
            version,
            xml_lang,
            metadata,
            doc_title,
            nav_map,
            page_list,
        })
    }

    fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
        for attr_result in e.attributes() {
            let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
            if attr.key.local_name().as_ref() == name {
                return Ok(Some(attr.unescape_value()?.to_string()));
            }
        }
        Ok(None)
    }

    /// 解析meta元素
    fn parse_meta_element(e: &BytesStart, metadata: &mut NcxMetadata) -> Result<()> {
        let name = Self::attribute(e, b"name")?.unwrap_or_default();
        let content = Self::attribute(e, b"content")?.unwrap_or_default();

        match name.as_str() {
            "dtb:uid" => metadata.uid = Some(content),
            "dtb:depth" => metadata.depth = content.parse().ok(),
            "dtb:totalPageCount" => metadata.total_page_count = content.parse().ok(),
            "dtb:maxPageNumber" => metadata.max_page_number = content.parse().ok(),
            _ => {
                metadata.other_metadata.insert(name, content);
            }
        }

        Ok(())
    }

    pub fn get_uid(&self) -> Option<&String> {
        self.metadata.uid.as_ref()
    }

    /// 获取文档标题文本
    pub fn get_title(&self) -> Option<&String> {
        self.doc_title.as_ref().map(|title| &title.text)
    }

    /// 获取所有导航点的平铺列表
    pub fn get_all_nav_points(&self) -> Vec<&NavPoint> {
        self.nav_map.get_all_nav_points()
    }

    /// 获取页面列表引用
    pub fn get_page_list(&self) -> Option<&PageList> {
        self.page_list.as_ref()
    }
}
