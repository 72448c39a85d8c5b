//! 元数据处理模块
//!
//! 提供EPUB元数据的结构定义和处理功能。
//! 解析时按文档顺序保存Dublin Core元素和meta标签，取值时再做解释。

use std::collections::HashMap;

/// 一个Dublin Core元素，如`<dc:title>`、`<dc:creator id="c1">`
#[derive(Debug, Clone, PartialEq)]
pub struct DublinCore {
    /// 去掉命名空间前缀后的元素名（title、creator……）
    pub name: String,
    /// 元素内容
    pub value: String,
    /// 元素属性（如 id, role, scheme等）
    pub attributes: HashMap<String, String>,
}

/// meta标签
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    /// 基于name属性的meta标签，如 <meta name="cover" content="cover-image"/>
    NameBased { name: String, content: String },
    /// 基于property属性的meta标签，如 <meta property="dcterms:modified">2025-06-05T11:24:01Z</meta>
    PropertyBased { property: String, content: String },
    /// 基于refines属性的meta标签，如 <meta refines="#creator" property="role">aut</meta>
    RefinesBased {
        /// 被精化的元素ID（不包含#前缀）
        refines_id: String,
        property: String,
        content: String,
        scheme: Option<String>,
    },
}

/// 创建者信息(作者、编辑者等)
#[derive(Debug, Clone, PartialEq)]
pub struct Creator {
    pub name: String,
    /// 角色(如author、editor等)
    pub role: Option<String>,
    pub display_seq: Option<u32>,
    /// 元素ID（用于关联refines元数据）
    pub id: Option<String>,
}

/// 标识符信息
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub value: String,
    /// 标识符类型(如ISBN、UUID等)
    pub scheme: Option<String>,
    pub id: Option<String>,
}

/// OPF文件中的元数据信息
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    dublin_core: Vec<DublinCore>,
    metas: Vec<MetaValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加Dublin Core元数据
    pub fn add_dublin_core(&mut self, name: String, value: String, attributes: HashMap<String, String>) {
        self.dublin_core.push(DublinCore {
            name,
            value,
            attributes,
        });
    }

    /// 添加meta元数据
    pub fn add_meta(&mut self, meta: MetaValue) {
        self.metas.push(meta);
    }

    fn first(&self, name: &str) -> Option<&DublinCore> {
        self.dublin_core.iter().find(|dc| dc.name == name)
    }

    fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DublinCore> + 'a {
        self.dublin_core.iter().filter(move |dc| dc.name == name)
    }

    fn refines_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.metas.iter().filter_map(move |meta| match meta {
            MetaValue::RefinesBased {
                refines_id,
                property,
                content,
                ..
            } if refines_id == id => Some((property.as_str(), content.as_str())),
            _ => None,
        })
    }

    /// 获取标题
    pub fn title(&self) -> Option<String> {
        self.first("title").map(|dc| dc.value.clone())
    }

    /// 获取语言
    pub fn language(&self) -> Option<String> {
        self.first("language").map(|dc| dc.value.clone())
    }

    /// 获取所有创建者（支持EPUB3的refines关联）
    pub fn creators(&self) -> Vec<Creator> {
        self.all("creator")
            .map(|dc| {
                let mut creator = Creator {
                    name: dc.value.clone(),
                    role: dc.attributes.get("role").map(|role| Self::expand_role(role)),
                    display_seq: None,
                    id: dc.attributes.get("id").cloned(),
                };

                if let Some(id) = dc.attributes.get("id") {
                    for (property, content) in self.refines_of(id) {
                        match property {
                            "role" => creator.role = Some(Self::expand_role(content)),
                            "display-seq" => creator.display_seq = content.parse().ok(),
                            _ => {}
                        }
                    }
                }

                creator
            })
            .collect()
    }

    fn expand_role(code: &str) -> String {
        match code {
            "aut" => "author".to_string(),
            "edt" => "editor".to_string(),
            "trl" => "translator".to_string(),
            "ill" => "illustrator".to_string(),
            other => other.to_string(),
        }
    }

    /// 获取所有标识符
    pub fn identifiers(&self) -> Vec<Identifier> {
        self.all("identifier")
            .map(|dc| Identifier {
                value: dc.value.clone(),
                scheme: dc.attributes.get("scheme").cloned(),
                id: dc.attributes.get("id").cloned(),
            })
            .collect()
    }

    /// 获取修改时间
    pub fn modified(&self) -> Option<String> {
        self.metas.iter().find_map(|meta| match meta {
            MetaValue::PropertyBased { property, content } if property == "dcterms:modified" => {
                Some(content.clone())
            }
            _ => None,
        })
    }

    /// 按name查找meta标签内容，如`cover`
    pub fn meta_content(&self, name: &str) -> Option<String> {
        self.metas.iter().find_map(|meta| match meta {
            MetaValue::NameBased { name: n, content } if n == name => Some(content.clone()),
            _ => None,
        })
    }

    /// 所有Dublin Core元素（文档顺序）
    pub fn dublin_core(&self) -> &[DublinCore] {
        &self.dublin_core
    }

    /// 所有meta标签（文档顺序）
    pub fn metas(&self) -> &[MetaValue] {
        &self.metas
    }
}
