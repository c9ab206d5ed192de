//! 条件规则引擎
//!
//! 提供可复用的条件编译与规则匹配能力，支持：
//! - WHERE 子句风格的条件文本编译为强类型谓词
//! - 按形状缓存的字段别名元数据
//! - 按规则集分组的线程安全规则存储
//! - 单事实对整个规则集的直接谓词评估
//! - 规则目录的幂等导入

pub mod coercion;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod ingestion;
pub mod lexer;
pub mod metadata;
pub mod models;
pub mod operators;
pub mod parser;
pub mod predicate;
pub mod shape;
pub mod shapes;
pub mod store;
pub mod telemetry;

pub use compiler::{ConditionCompiler, ShapeRegistry};
pub use engine::DynamicRulesEngine;
pub use error::{CompilationError, Result, RuleError};
pub use ingestion::{IngestionReport, RuleCatalog, RuleIngestionService};
pub use metadata::{EntityMetadata, EntityMetadataCache};
pub use models::{
    EvaluationResult, RuleContact, RuleDefinition, RuleMatch, RuleMetadata, RuleOptions, RuleTag,
    RuleVersion, StoredRule,
};
pub use operators::{CompareOp, LikeMatch, LogicalOperator};
pub use predicate::{CompiledPredicate, Expr, Predicate};
pub use shape::{FactShape, FieldDescriptor, FieldType, FieldValue, Record, ShapeRef};
pub use store::{InMemoryRuleStore, RuleStore};
