//! 角色原型
//!
//! 角色名在进入分配引擎时解析一次，之后只按原型匹配。

use serde::{Deserialize, Serialize};

use super::profile::ProfileKind;

/// 角色原型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// 普通用户，权威记录留在账户
    Base,
    Practitioner,
    /// Admin 与 SuperAdmin 共用管理员档案
    AdministratorFamily,
    Organization,
    /// 未识别的角色名，不迁移记录
    Other,
}

impl Archetype {
    /// 需要迁移到的档案种类
    pub fn profile_kind(&self) -> Option<ProfileKind> {
        match self {
            Archetype::Practitioner => Some(ProfileKind::Practitioner),
            Archetype::AdministratorFamily => Some(ProfileKind::Administrator),
            Archetype::Organization => Some(ProfileKind::Organization),
            Archetype::Base | Archetype::Other => None,
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.profile_kind().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Base => "base",
            Archetype::Practitioner => "practitioner",
            Archetype::AdministratorFamily => "administrator_family",
            Archetype::Organization => "organization",
            Archetype::Other => "other",
        }
    }
}

/// 归一化角色名：小写，忽略空格、下划线和连字符
pub fn normalize_role_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// 角色名 → 原型对照表 (`access.archetypes` 配置段)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeRules {
    pub base: Vec<String>,
    pub practitioner: Vec<String>,
    pub administrator: Vec<String>,
    /// 同属管理员原型，且置位 is_super_admin
    pub super_admin: Vec<String>,
    pub organization: Vec<String>,
}

impl Default for ArchetypeRules {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            base: names(&["user", "patient"]),
            practitioner: names(&["practitioner", "doctor"]),
            administrator: names(&["admin", "administrator"]),
            super_admin: names(&["superadmin"]),
            organization: names(&["organization", "organisation", "clinic"]),
        }
    }
}

impl ArchetypeRules {
    pub fn resolve(&self, role_name: &str) -> Archetype {
        let key = normalize_role_name(role_name);
        if contains(&self.super_admin, &key) || contains(&self.administrator, &key) {
            Archetype::AdministratorFamily
        } else if contains(&self.practitioner, &key) {
            Archetype::Practitioner
        } else if contains(&self.organization, &key) {
            Archetype::Organization
        } else if contains(&self.base, &key) {
            Archetype::Base
        } else {
            Archetype::Other
        }
    }

    pub fn is_super_admin(&self, role_name: &str) -> bool {
        contains(&self.super_admin, &normalize_role_name(role_name))
    }
}

fn contains(names: &[String], key: &str) -> bool {
    names.iter().any(|n| normalize_role_name(n) == key)
}
