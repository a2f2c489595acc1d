//! role-access 运维命令行
//!
//! 迁移数据库，并在管理界面之外直接分配/撤销角色、查看有效权限。

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clinic_adapter_postgres::check_connection;
use clinic_common::{ActorId, IdentityId, Pagination};
use role_access::application::catalog::{ListRolesQuery, SearchRolesQuery};
use role_access::application::{AssignRoleCommand, RevokeRoleCommand};
use role_access::domain::catalog::RoleId;
use role_access::{AccessServices, ServiceConfig, run_migrations};
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "role-access", version)]
#[command(about = "Role assignment, permission resolution and role catalog administration")]
struct Cli {
    /// 配置目录
    #[arg(long, env = "ROLE_ACCESS_CONFIG_DIR", default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 执行数据库迁移
    Migrate,
    /// 检查数据库连接
    Check,
    /// 为账户分配角色
    Assign {
        #[command(flatten)]
        target: RoleTarget,
        /// 设为主角色
        #[arg(long)]
        primary: bool,
    },
    /// 撤销账户的角色
    Revoke {
        #[command(flatten)]
        target: RoleTarget,
    },
    /// 列出账户的有效权限
    Permissions {
        #[arg(long)]
        identity: IdentityId,
    },
    /// 列出或搜索角色
    Roles {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
}

#[derive(Args, Debug)]
struct RoleTarget {
    #[arg(long)]
    identity: IdentityId,
    /// 角色 ID 或名称
    #[arg(long)]
    role: String,
    /// 操作人 ID，写入审计记录
    #[arg(long, env = "ROLE_ACCESS_ACTOR")]
    actor: Option<ActorId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServiceConfig::load(&cli.config_dir).context("failed to load configuration")?;
    clinic_telemetry::init(&config.app.telemetry, config.app.is_production())?;
    info!(app_name = %config.app.app_name, app_env = %config.app.app_env, "Starting");

    let (services, pool) = AccessServices::connect(&config).await?;

    match cli.command {
        Command::Migrate => run_migrations(&pool).await?,
        Command::Check => {
            check_connection(&pool).await?;
            info!("Database reachable");
        }
        Command::Assign { target, primary } => {
            let role_id = resolve_role(&services, &target.role).await?;
            let mut cmd = AssignRoleCommand::new(target.identity, role_id);
            if primary {
                cmd = cmd.primary();
            }
            cmd.performed_by = target.actor;
            print_json(&services.assignments.assign_role(cmd).await?)?;
        }
        Command::Revoke { target } => {
            let role_id = resolve_role(&services, &target.role).await?;
            let mut cmd = RevokeRoleCommand::new(target.identity, role_id);
            cmd.performed_by = target.actor;
            print_json(&services.assignments.revoke_role(cmd).await?)?;
        }
        Command::Permissions { identity } => {
            print_json(&services.permissions.effective_permissions(&identity).await?)?;
        }
        Command::Roles {
            search,
            page,
            page_size,
        } => {
            let pagination = Pagination::new(page, page_size);
            let roles = match search {
                Some(query) => {
                    services
                        .catalog_queries
                        .search_roles(SearchRolesQuery { query, pagination })
                        .await?
                }
                None => {
                    services
                        .catalog_queries
                        .list_roles(ListRolesQuery {
                            pagination,
                            include_deleted: false,
                        })
                        .await?
                }
            };
            print_json(&roles)?;
        }
    }

    pool.close().await;
    Ok(())
}

/// 先按 ID 解析，否则按名称查找
async fn resolve_role(services: &AccessServices, role: &str) -> Result<RoleId> {
    if let Ok(id) = role.parse::<RoleId>() {
        return Ok(id);
    }
    let found = services
        .catalog_queries
        .get_role_by_name(role)
        .await
        .with_context(|| format!("unknown role '{}'", role))?;
    Ok(found.id)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
