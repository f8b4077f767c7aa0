use crate::error::ItemError;
use crate::models::id_alias::IdAliasMap;
use crate::models::item::{Item, RawItem};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 别名记录
#[derive(Debug, Clone, Deserialize)]
pub struct AliasEntry {
    pub canonical: String,
    pub alias: String,
}

/// 一个题目集文件
#[derive(Debug, Clone, Deserialize)]
pub struct ItemSet {
    pub name: String,
    #[serde(default)]
    pub items: Vec<RawItem>,
    #[serde(default)]
    pub aliases: Vec<AliasEntry>,
    #[serde(skip)]
    pub file_path: Option<String>,
}

impl ItemSet {
    /// 构建别名表
    pub fn alias_map(&self) -> Result<IdAliasMap, ItemError> {
        IdAliasMap::from_pairs(
            self.aliases
                .iter()
                .map(|a| (a.canonical.clone(), a.alias.clone())),
        )
    }

    /// 校验并转换所有题目，ID 统一为规范 ID
    ///
    /// 返回 (合法题目, 被拒绝的记录及原因)
    pub fn into_items(self, aliases: &IdAliasMap) -> (Vec<Item>, Vec<(String, ItemError)>) {
        let mut items: Vec<Item> = Vec::new();
        let mut rejected = Vec::new();

        for raw in self.items {
            let raw_id = raw.id.clone();
            match Item::try_from(raw) {
                Ok(item) => {
                    let canonical = aliases.canonical(item.id()).to_string();
                    if items.iter().any(|i| i.id() == canonical) {
                        tracing::warn!("题目 {} 重复 (规范ID: {})，已忽略", raw_id, canonical);
                        continue;
                    }
                    items.push(item.with_id(canonical));
                }
                Err(e) => rejected.push((raw_id, e)),
            }
        }

        (items, rejected)
    }
}

/// 从 TOML 文件加载题目集
pub async fn load_toml_to_item_set(toml_file_path: &Path) -> Result<ItemSet> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut set: ItemSet = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    set.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(set)
}

/// 从文件夹中加载所有 TOML 题目集
pub async fn load_all_toml_files(folder_path: &str) -> Result<Vec<ItemSet>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut item_sets = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::info!(
                "正在加载: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_toml_to_item_set(&path).await {
                Ok(set) => {
                    tracing::info!("成功加载 {} 个题目", set.items.len());
                    item_sets.push(set);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(item_sets)
}
