//! NCX导航元素数据结构定义
//!
//! 定义NCX文件中的各种导航元素，包括导航点、导航标签、内容引用等，
//! 以及合并时生成目录所用的[`NavigationEntry`]。

use std::collections::HashMap;

/// 合并后目录中的一项
///
/// `target`是相对于包文件目录的内容文档路径，`play_order`从1开始连续递增。
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationEntry {
    pub label: String,
    pub target: String,
    pub play_order: u32,
}

impl NavigationEntry {
    pub fn new(label: impl Into<String>, target: impl Into<String>, play_order: u32) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
            play_order,
        }
    }
}

/// NCX元数据信息
#[derive(Debug, Clone, Default)]
pub struct NcxMetadata {
    /// 唯一标识符（dtb:uid）
    pub uid: Option<String>,
    /// 导航深度（dtb:depth）
    pub depth: Option<u32>,
    /// 总页数（dtb:totalPageCount）
    pub total_page_count: Option<u32>,
    /// 最大页码（dtb:maxPageNumber）
    pub max_page_number: Option<u32>,
    /// 其他元数据
    pub other_metadata: HashMap<String, String>,
}

impl NcxMetadata {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 文档标题
#[derive(Debug, Clone)]
pub struct DocTitle {
    pub text: String,
}

impl DocTitle {
    pub fn new(text: String) -> Self {
        Self { text }
    }
}

/// 导航标签
#[derive(Debug, Clone)]
pub struct NavLabel {
    pub text: String,
}

impl NavLabel {
    pub fn new(text: String) -> Self {
        Self { text }
    }
}

/// 导航内容引用
#[derive(Debug, Clone)]
pub struct NavContent {
    /// 源文件路径
    pub src: String,
}

impl NavContent {
    pub fn new(src: String) -> Self {
        Self { src }
    }
}

/// 导航点
#[derive(Debug, Clone)]
pub struct NavPoint {
    pub id: String,
    /// 播放顺序
    pub play_order: u32,
    pub class: Option<String>,
    pub nav_label: NavLabel,
    pub content: NavContent,
    /// 子导航点
    pub children: Vec<NavPoint>,
}

impl NavPoint {
    /// 创建新的导航点
    pub fn new(id: String, play_order: u32, nav_label: NavLabel, content: NavContent) -> Self {
        Self {
            id,
            play_order,
            class: None,
            nav_label,
            content,
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: NavPoint) {
        self.children.push(child);
    }

    /// 按playOrder排序子导航点
    pub fn sort_children_by_play_order(&mut self) {
        self.children.sort_by_key(|child| child.play_order);
        for child in &mut self.children {
            child.sort_children_by_play_order();
        }
    }

    /// 获取所有导航点（包括子导航点）的平铺列表
    pub fn get_all_nav_points(&self) -> Vec<&NavPoint> {
        let mut points = vec![self];
        for child in &self.children {
            points.extend(child.get_all_nav_points());
        }
        points
    }

    /// 获取导航深度
    pub fn get_depth(&self) -> u32 {
        1 + self.children.iter().map(|child| child.get_depth()).max().unwrap_or(0)
    }
}

/// 导航地图
#[derive(Debug, Clone, Default)]
pub struct NavMap {
    pub nav_points: Vec<NavPoint>,
}

impl NavMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_nav_point(&mut self, nav_point: NavPoint) {
        self.nav_points.push(nav_point);
    }

    /// 按playOrder排序所有导航点（包括子导航点）
    pub fn sort_by_play_order(&mut self) {
        self.nav_points.sort_by_key(|point| point.play_order);
        for nav_point in &mut self.nav_points {
            nav_point.sort_children_by_play_order();
        }
    }

    /// 获取所有导航点的平铺列表
    pub fn get_all_nav_points(&self) -> Vec<&NavPoint> {
        self.nav_points
            .iter()
            .flat_map(|nav_point| nav_point.get_all_nav_points())
            .collect()
    }

    /// 获取导航深度
    pub fn get_depth(&self) -> u32 {
        self.nav_points.iter().map(|point| point.get_depth()).max().unwrap_or(0)
    }
}

/// 页面目标
#[derive(Debug, Clone)]
pub struct PageTarget {
    pub id: String,
    /// 页面类型（normal, front, special等）
    pub page_type: String,
    /// 页码
    pub value: String,
    pub play_order: u32,
    pub nav_label: NavLabel,
    pub content: NavContent,
}

impl PageTarget {
    pub fn new(
        id: String,
        page_type: String,
        value: String,
        play_order: u32,
        nav_label: NavLabel,
        content: NavContent,
    ) -> Self {
        Self {
            id,
            page_type,
            value,
            play_order,
            nav_label,
            content,
        }
    }
}

/// 页面列表
#[derive(Debug, Clone, Default)]
pub struct PageList {
    pub nav_label: Option<NavLabel>,
    pub page_targets: Vec<PageTarget>,
}

impl PageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page_target(&mut self, page_target: PageTarget) {
        self.page_targets.push(page_target);
    }

    /// 根据页码查找页面目标
    pub fn find_page_target_by_value(&self, value: &str) -> Option<&PageTarget> {
        self.page_targets.iter().find(|target| target.value == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, order: u32) -> NavPoint {
        NavPoint::new(
            id.to_string(),
            order,
            NavLabel::new(id.to_string()),
            NavContent::new(format!("{}.xhtml", id)),
        )
    }

    #[test]
    fn test_sort_and_flatten() {
        let mut parent = point("b", 2);
        parent.add_child(point("b2", 4));
        parent.add_child(point("b1", 3));

        let mut nav_map = NavMap::new();
        nav_map.add_nav_point(parent);
        nav_map.add_nav_point(point("a", 1));
        nav_map.sort_by_play_order();

        let orders: Vec<u32> = nav_map.get_all_nav_points().iter().map(|p| p.play_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4]);
        assert_eq!(nav_map.get_depth(), 2);
    }
}
