//! ports - 抽象 trait 层
//!
//! 定义核心依赖的外部协作方接口

mod audit;

pub use audit::*;
