//! 题目 ID 别名表
//!
//! 同一道题在页面、题库、批改接口中可能使用不同的 ID。
//! 加载时一次性建立 别名 ↔ 规范ID 的双向映射，流程内部只使用规范 ID，
//! 回到页面填写时再换回页面ID。

use std::collections::HashMap;

use crate::error::ItemError;

#[derive(Debug, Clone, Default)]
pub struct IdAliasMap {
    to_canonical: HashMap<String, String>,
    to_platform: HashMap<String, String>,
}

impl IdAliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由 (规范ID, 别名) 对构建
    ///
    /// 一个别名只能指向一个规范 ID，一个规范 ID 也只能有一个别名；
    /// 规范 ID 不能同时作为另一个题目的别名
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ItemError>
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut map = Self::new();
        for (canonical, alias) in pairs {
            map.insert(canonical.into(), alias.into())?;
        }
        Ok(map)
    }

    fn insert(&mut self, canonical: String, alias: String) -> Result<(), ItemError> {
        if let Some(existing) = self.to_platform.get(&canonical) {
            if *existing != alias {
                return Err(ItemError::DuplicatePlatformId {
                    canonical,
                    first: existing.clone(),
                    second: alias,
                });
            }
        }
        self.bind(canonical.clone(), canonical.clone())?;
        if alias != canonical {
            self.bind(alias.clone(), canonical.clone())?;
        }
        self.to_platform.insert(canonical, alias);
        Ok(())
    }

    fn bind(&mut self, key: String, canonical: String) -> Result<(), ItemError> {
        match self.to_canonical.get(&key) {
            Some(existing) if *existing != canonical => Err(ItemError::ConflictingAlias {
                alias: key,
                first: existing.clone(),
                second: canonical,
            }),
            Some(_) => Ok(()),
            None => {
                self.to_canonical.insert(key, canonical);
                Ok(())
            }
        }
    }

    /// 任意已知 ID 的规范形式；未知 ID 原样返回
    pub fn canonical<'a>(&'a self, id: &'a str) -> &'a str {
        self.to_canonical.get(id).map(String::as_str).unwrap_or(id)
    }

    /// 规范 ID 在页面上使用的 ID；没有别名时即为规范 ID
    pub fn platform_id<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.to_platform.get(canonical).map(String::as_str).unwrap_or(canonical)
    }

    pub fn is_empty(&self) -> bool {
        self.to_canonical.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_canonical.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalizes_aliases() {
        let map = IdAliasMap::from_pairs([("q1", "page-1"), ("q2", "page-2")]).unwrap();
        assert_eq!(map.canonical("page-1"), "q1");
        assert_eq!(map.canonical("q1"), "q1");
        assert_eq!(map.canonical("unknown"), "unknown");
    }

    #[test]
    fn test_platform_id_round_trips() {
        let map = IdAliasMap::from_pairs([("q1", "page-1"), ("q2", "q2")]).unwrap();
        assert_eq!(map.platform_id("q1"), "page-1");
        assert_eq!(map.platform_id(map.canonical("page-1")), "page-1");
        assert_eq!(map.platform_id("q2"), "q2");
        assert_eq!(map.platform_id("unknown"), "unknown");
    }

    #[test]
    fn test_rejects_second_platform_id() {
        let err = IdAliasMap::from_pairs([("q1", "page-1"), ("q1", "page-9")]).unwrap_err();
        assert!(matches!(
            err,
            ItemError::DuplicatePlatformId { ref first, ref second, .. } if first == "page-1" && second == "page-9"
        ));

        // 重复声明同一对别名不算冲突
        let map = IdAliasMap::from_pairs([("q1", "page-1"), ("q1", "page-1")]).unwrap();
        assert_eq!(map.platform_id("q1"), "page-1");
    }

    #[test]
    fn test_rejects_conflicting_alias() {
        let err = IdAliasMap::from_pairs([("q1", "x"), ("q2", "x")]).unwrap_err();
        assert!(matches!(err, ItemError::ConflictingAlias { .. }));
    }

    #[test]
    fn test_canonical_cannot_be_alias_of_other() {
        let err = IdAliasMap::from_pairs([("q1", "q2"), ("q2", "q3")]).unwrap_err();
        assert!(matches!(err, ItemError::ConflictingAlias { .. }));
    }
}
