//! 内置事实形状

mod encounter;

pub use encounter::{CptCodeOutput, Encounter};

use crate::compiler::ShapeRegistry;

/// 注册了全部内置形状的注册表
pub fn builtin_registry() -> ShapeRegistry {
    ShapeRegistry::new().with::<Encounter>()
}
