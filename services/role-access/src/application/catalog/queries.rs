//! 目录查询定义

use clinic_common::Pagination;

use crate::domain::repository::CatalogFilter;

/// 列出角色查询
#[derive(Debug, Clone, Default)]
pub struct ListRolesQuery {
    pub pagination: Pagination,
    pub include_deleted: bool,
}

/// 按名称片段搜索角色查询
#[derive(Debug, Clone)]
pub struct SearchRolesQuery {
    pub query: String,
    pub pagination: Pagination,
}

/// 列出权限查询
#[derive(Debug, Clone, Default)]
pub struct ListPermissionsQuery {
    pub pagination: Pagination,
    pub include_deleted: bool,
    pub search: Option<String>,
}

impl From<ListRolesQuery> for CatalogFilter {
    fn from(query: ListRolesQuery) -> Self {
        CatalogFilter {
            search: None,
            include_deleted: query.include_deleted,
            pagination: query.pagination,
        }
    }
}

impl From<SearchRolesQuery> for CatalogFilter {
    fn from(query: SearchRolesQuery) -> Self {
        CatalogFilter {
            search: Some(query.query),
            include_deleted: false,
            pagination: query.pagination,
        }
    }
}

impl From<ListPermissionsQuery> for CatalogFilter {
    fn from(query: ListPermissionsQuery) -> Self {
        CatalogFilter {
            search: query.search,
            include_deleted: query.include_deleted,
            pagination: query.pagination,
        }
    }
}
