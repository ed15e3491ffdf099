use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 输入输出样例
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Example {
    pub input: String,
    pub output: String,
}

/// 题目目录中的一道题
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub complexity: u32,
    /// 内存限制（KB）
    #[serde(default)]
    pub memory: u32,
    /// 时间限制（毫秒）
    #[serde(default)]
    pub time: u32,
    #[serde(default)]
    pub examples: Vec<Example>,
}

/// 只读题目目录，按编号查找
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: HashMap<u32, CatalogItem>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items: items.into_iter().map(|item| (item.id, item)).collect(),
        }
    }

    pub fn find(&self, id: u32) -> Option<&CatalogItem> {
        self.items.get(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
