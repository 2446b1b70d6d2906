//! 元数据处理模块
//!
//! 只保留阅读需要的Dublin Core元素（标题、创建者、标识符），
//! 并支持EPUB3通过 `<meta refines="#id">` 对元素做的补充说明。

use std::collections::HashMap;

/// 一个Dublin Core元素的值和属性
#[derive(Debug, Clone, Default)]
pub struct DcElement {
    /// 元素内容
    pub value: String,
    /// 元素属性（本地名称，如 id、role、scheme）
    pub attributes: HashMap<String, String>,
}

/// refines元数据，如 `<meta refines="#creator" property="role">aut</meta>`
#[derive(Debug, Clone)]
pub struct Refinement {
    pub property: String,
    pub content: String,
}

/// 创建者信息(作者、编辑者等)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    /// 创建者姓名
    pub name: String,
    /// 角色(如author、editor等)
    pub role: Option<String>,
    /// 显示顺序
    pub display_seq: Option<u32>,
    /// 元素ID（用于关联refines元数据）
    pub id: Option<String>,
}

impl Creator {
    /// 是否应当作为作者显示（没有角色的创建者也算作者）
    pub fn is_author(&self) -> bool {
        matches!(self.role.as_deref(), None | Some("author"))
    }
}

/// 标识符信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// 标识符值
    pub value: String,
    /// 标识符类型(如ISBN、UUID等)
    pub scheme: Option<String>,
    /// 元素ID，与package的unique-identifier对应
    pub id: Option<String>,
}

/// OPF文件中的元数据信息
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// 标签本地名 -> 元素列表（按出现顺序）
    elements: HashMap<String, Vec<DcElement>>,
    /// 被精化的元素ID -> 精化信息
    refines: HashMap<String, Vec<Refinement>>,
}

impl Metadata {
    /// 创建新的元数据实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加Dublin Core元数据
    pub fn add_dublin_core(&mut self, tag: String, value: String, attributes: HashMap<String, String>) {
        self.elements
            .entry(tag)
            .or_default()
            .push(DcElement { value, attributes });
    }

    /// 添加基于refines的meta元数据，`refines_id` 可以带 `#` 前缀
    pub fn add_refinement(&mut self, refines_id: &str, property: String, content: String) {
        let id = refines_id.strip_prefix('#').unwrap_or(refines_id);
        self.refines
            .entry(id.to_string())
            .or_default()
            .push(Refinement { property, content });
    }

    fn all(&self, tag: &str) -> &[DcElement] {
        self.elements.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 获取标题（第一个非空的dc:title）
    pub fn title(&self) -> Option<String> {
        self.all("title")
            .iter()
            .map(|element| element.value.trim())
            .find(|title| !title.is_empty())
            .map(str::to_string)
    }

    /// 获取所有创建者，按display-seq排序（没有的保持原顺序排在后面）
    pub fn creators(&self) -> Vec<Creator> {
        let mut creators: Vec<Creator> = self
            .all("creator")
            .iter()
            .map(|element| self.extract_creator(element))
            .collect();
        creators.sort_by_key(|creator| creator.display_seq.unwrap_or(u32::MAX));
        creators
    }

    /// 作者姓名列表
    pub fn authors(&self) -> Vec<String> {
        self.creators()
            .into_iter()
            .filter(Creator::is_author)
            .map(|creator| creator.name)
            .collect()
    }

    /// 获取所有标识符
    pub fn identifiers(&self) -> Vec<Identifier> {
        self.all("identifier")
            .iter()
            .map(|element| Identifier {
                value: element.value.trim().to_string(),
                scheme: element.attributes.get("scheme").cloned(),
                id: element.attributes.get("id").cloned(),
            })
            .collect()
    }

    /// 从元素中提取创建者信息（支持EPUB3的refines关联）
    fn extract_creator(&self, element: &DcElement) -> Creator {
        let mut creator = Creator {
            name: element.value.trim().to_string(),
            role: element.attributes.get("role").map(|role| relator_name(role)),
            display_seq: None,
            id: element.attributes.get("id").cloned(),
        };

        let refinements = creator
            .id
            .as_ref()
            .and_then(|id| self.refines.get(id))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for refinement in refinements {
            match refinement.property.as_str() {
                "role" => creator.role = Some(relator_name(&refinement.content)),
                "display-seq" => creator.display_seq = refinement.content.trim().parse().ok(),
                _ => {}
            }
        }

        creator
    }
}

/// MARC relator代码转为可读的角色名
fn relator_name(code: &str) -> String {
    match code.trim() {
        "aut" => "author".to_string(),
        "edt" => "editor".to_string(),
        "trl" => "translator".to_string(),
        "ill" => "illustrator".to_string(),
        other => other.to_string(),
    }
}
