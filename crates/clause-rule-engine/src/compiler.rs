//! 条件编译器
//!
//! 将条件文本编译成绑定到事实形状的谓词：词法分析、语法分析，
//! 然后在一次树遍历中完成属性路径解析、NULL / LIKE / IN 翻译以及字面量类型转换。

use crate::coercion::coerce;
use crate::error::CompilationError;
use crate::lexer::tokenize;
use crate::metadata::EntityMetadataCache;
use crate::operators::{CompareOp, LikeMatch, LogicalOperator};
use crate::parser::{Clause, RawPath, parse};
use crate::predicate::{CompiledPredicate, Expr, FieldPath, Predicate};
use crate::shape::{FactShape, FieldDescriptor, FieldType, ShapeRef};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 条件编译器
#[derive(Debug, Clone)]
pub struct ConditionCompiler {
    metadata: Arc<EntityMetadataCache>,
}

impl ConditionCompiler {
    /// 使用进程级共享的元数据缓存
    pub fn new() -> Self {
        Self::with_cache(EntityMetadataCache::shared())
    }

    pub fn with_cache(metadata: Arc<EntityMetadataCache>) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &EntityMetadataCache {
        &self.metadata
    }

    /// 针对事实类型 `F` 编译条件
    pub fn compile<F: FactShape>(
        &self,
        condition: &str,
    ) -> Result<CompiledPredicate<F>, CompilationError> {
        self.compile_shape(ShapeRef::of::<F>(), condition)
            .map(CompiledPredicate::new)
    }

    /// 针对任意已声明的形状编译条件
    ///
    /// 空白条件编译为恒真谓词。
    pub fn compile_shape(
        &self,
        shape: ShapeRef,
        condition: &str,
    ) -> Result<Predicate, CompilationError> {
        if condition.trim().is_empty() {
            return Ok(Predicate::new(shape.name(), Expr::Constant { value: true }));
        }

        let tokens = tokenize(condition)?;
        let clause = parse(&tokens)?;
        let root = self.bind(shape, clause)?;

        debug!(shape = shape.name(), expr = %root, "条件编译完成");
        Ok(Predicate::new(shape.name(), root))
    }

    fn bind(&self, shape: ShapeRef, clause: Clause) -> Result<Expr, CompilationError> {
        match clause {
            Clause::And(children) => self.bind_group(shape, LogicalOperator::And, children),
            Clause::Or(children) => self.bind_group(shape, LogicalOperator::Or, children),
            Clause::Not(inner) => Ok(Expr::Not {
                operand: Box::new(self.bind(shape, *inner)?),
            }),
            Clause::Compare {
                path,
                operator,
                literal,
            } => {
                let (path, field) = self.resolve_path(shape, &path)?;
                check_compare(&path, &field, operator)?;
                Ok(Expr::Compare {
                    value: coerce(&literal.text, field.field_type())?,
                    path,
                    operator,
                })
            }
            Clause::Like { path, pattern } => {
                let (path, field) = self.resolve_path(shape, &path)?;
                if !field.field_type().is_string() {
                    return Err(CompilationError::LikeOnNonString {
                        property: path.to_string(),
                        field_type: field.field_type().to_string(),
                    });
                }
                let (mode, value) = like_mode(&pattern)?;
                Ok(Expr::Like { path, mode, value })
            }
            Clause::In {
                path,
                negated,
                values,
            } => {
                let (path, field) = self.resolve_path(shape, &path)?;
                if let FieldType::Nested(_) = field.field_type() {
                    return Err(unsupported(
                        if negated { "NOT IN" } else { "IN" },
                        &path,
                        &field,
                    ));
                }
                if values.is_empty() {
                    return Err(CompilationError::EmptyInList {
                        property: path.to_string(),
                    });
                }
                let values = values
                    .iter()
                    .map(|literal| coerce(&literal.text, field.field_type()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::In {
                    path,
                    values,
                    negated,
                })
            }
            Clause::IsNull { path, negated } => {
                let (path, field) = self.resolve_path(shape, &path)?;
                if !field.is_nullable() {
                    return Err(CompilationError::NotNullable {
                        property: path.to_string(),
                    });
                }
                Ok(Expr::IsNull { path, negated })
            }
        }
    }

    fn bind_group(
        &self,
        shape: ShapeRef,
        operator: LogicalOperator,
        children: Vec<Clause>,
    ) -> Result<Expr, CompilationError> {
        let children = children
            .into_iter()
            .map(|child| self.bind(shape, child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::Group { operator, children })
    }

    /// 逐段解析属性路径，返回声明名称组成的路径与末段字段描述符
    fn resolve_path(
        &self,
        shape: ShapeRef,
        path: &RawPath,
    ) -> Result<(FieldPath, FieldDescriptor), CompilationError> {
        let mut owner = shape.name().to_string();
        let mut current = Some(shape);
        let mut resolved = Vec::with_capacity(path.segments.len());
        let mut last = None;

        for segment in &path.segments {
            let not_found = || CompilationError::PropertyNotFound {
                segment: segment.clone(),
                shape: owner.clone(),
            };
            let target = current.ok_or_else(not_found)?;
            let field = self
                .metadata
                .metadata_for_shape(target)
                .lookup(segment)
                .cloned()
                .ok_or_else(not_found)?;

            resolved.push(field.name().to_string());
            owner = field.field_type().to_string();
            current = field.nested_shape();
            last = Some(field);
        }

        match last {
            Some(field) => Ok((FieldPath::new(resolved), field)),
            None => Err(CompilationError::Syntax {
                position: path.position,
                message: "empty property path".to_string(),
            }),
        }
    }
}

impl Default for ConditionCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn check_compare(
    path: &FieldPath,
    field: &FieldDescriptor,
    operator: CompareOp,
) -> Result<(), CompilationError> {
    let supported = match field.field_type() {
        FieldType::Nested(_) => false,
        FieldType::Boolean | FieldType::Uuid => !operator.is_ordering(),
        _ => true,
    };

    if supported {
        Ok(())
    } else {
        Err(unsupported(&operator.to_string(), path, field))
    }
}

fn unsupported(operator: &str, path: &FieldPath, field: &FieldDescriptor) -> CompilationError {
    CompilationError::UnsupportedOperator {
        operator: operator.to_string(),
        property: path.to_string(),
        field_type: field.field_type().to_string(),
    }
}

/// 翻译 LIKE 模式：只允许首尾的 `%`
fn like_mode(pattern: &str) -> Result<(LikeMatch, String), CompilationError> {
    let (leading, rest) = match pattern.strip_prefix('%') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let (trailing, body) = match rest.strip_suffix('%') {
        Some(body) => (true, body),
        None => (false, rest),
    };

    if body.contains('%') || body.contains('_') {
        return Err(CompilationError::UnsupportedLikePattern {
            pattern: pattern.to_string(),
        });
    }

    let mode = match (leading, trailing) {
        (true, true) => LikeMatch::Contains,
        (true, false) => LikeMatch::EndsWith,
        (false, true) => LikeMatch::StartsWith,
        (false, false) => LikeMatch::Exact,
    };

    Ok((mode, body.to_string()))
}

/// 形状注册表：按名称（不区分大小写）选择编译目标
#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    shapes: HashMap<String, ShapeRef>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F: FactShape>(&mut self) -> &mut Self {
        self.shapes
            .insert(F::SHAPE_NAME.to_lowercase(), ShapeRef::of::<F>());
        self
    }

    pub fn with<F: FactShape>(mut self) -> Self {
        self.register::<F>();
        self
    }

    pub fn get(&self, name: &str) -> Result<ShapeRef, CompilationError> {
        self.shapes
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| CompilationError::UnknownShape(name.to_string()))
    }

    /// 已注册的形状名称（排序后）
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.shapes.values().map(ShapeRef::name).collect();
        names.sort_unstable();
        names
    }

    pub fn compile(
        &self,
        compiler: &ConditionCompiler,
        shape_name: &str,
        condition: &str,
    ) -> Result<Predicate, CompilationError> {
        compiler.compile_shape(self.get(shape_name)?, condition)
    }
}
