//! 规则引擎错误类型

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// 条件编译错误
///
/// 编译器对所有无法编译的条件只返回这一种错误，消息中包含出错的片段以及目标字段或类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Property '{segment}' was not found on '{shape}'.")]
    PropertyNotFound { segment: String, shape: String },

    #[error(
        "LIKE can only be used with string properties. Property '{property}' is of type '{field_type}'."
    )]
    LikeOnNonString {
        property: String,
        field_type: String,
    },

    #[error(
        "LIKE pattern '{pattern}' is not supported. Only leading and trailing '%' wildcards are allowed."
    )]
    UnsupportedLikePattern { pattern: String },

    #[error("Property '{property}' is not nullable and cannot be compared to NULL.")]
    NotNullable { property: String },

    #[error("IN operator on '{property}' requires at least one value.")]
    EmptyInList { property: String },

    #[error("Value '{value}' could not be converted to {target}.")]
    LiteralConversion { value: String, target: String },

    #[error("Operator '{operator}' is not supported for property '{property}' of type '{field_type}'.")]
    UnsupportedOperator {
        operator: String,
        property: String,
        field_type: String,
    },

    #[error("Fact shape '{0}' is not registered.")]
    UnknownShape(String),
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则编译失败: {0}")]
    Compilation(#[from] CompilationError),

    #[error("操作已取消")]
    Cancelled,

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// 入口处的取消检查
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(RuleError::Cancelled)
    } else {
        Ok(())
    }
}
