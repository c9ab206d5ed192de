//! 编译后的谓词
//!
//! [`Expr`] 是字段与字面量均已绑定的表达式树，可序列化为 JSON 作为规则的持久化形式。
//! [`Predicate`] 记录它所属的形状名称；[`CompiledPredicate`] 是面向具体事实类型的强类型包装。

use crate::coercion::Literal;
use crate::evaluator::ConditionEvaluator;
use crate::operators::{CompareOp, LikeMatch, LogicalOperator};
use crate::shape::{FactShape, FieldValue, Record};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// 已解析的属性路径（各段均为字段声明名称）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// 沿路径取值；中间节点为空时整体为空
    pub fn resolve<'r>(&self, record: &'r dyn Record) -> FieldValue<'r> {
        let Some((last, parents)) = self.0.split_last() else {
            return FieldValue::Null;
        };

        let mut current = record;
        for segment in parents {
            match current.field_value(segment) {
                FieldValue::Record(child) => current = child,
                _ => return FieldValue::Null,
            }
        }

        current.field_value(last)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// 表达式节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Constant {
        value: bool,
    },
    Group {
        operator: LogicalOperator,
        children: Vec<Expr>,
    },
    Not {
        operand: Box<Expr>,
    },
    Compare {
        path: FieldPath,
        operator: CompareOp,
        value: Literal,
    },
    Like {
        path: FieldPath,
        mode: LikeMatch,
        value: String,
    },
    In {
        path: FieldPath,
        values: Vec<Literal>,
        negated: bool,
    },
    IsNull {
        path: FieldPath,
        negated: bool,
    },
}

impl Expr {
    /// 求值；AND/OR 短路
    pub fn evaluate(&self, record: &dyn Record) -> bool {
        match self {
            Self::Constant { value } => *value,
            Self::Group {
                operator: LogicalOperator::And,
                children,
            } => children.iter().all(|child| child.evaluate(record)),
            Self::Group {
                operator: LogicalOperator::Or,
                children,
            } => children.iter().any(|child| child.evaluate(record)),
            Self::Not { operand } => !operand.evaluate(record),
            Self::Compare {
                path,
                operator,
                value,
            } => ConditionEvaluator::compare(path.resolve(record), *operator, value),
            Self::Like { path, mode, value } => {
                ConditionEvaluator::like(path.resolve(record), *mode, value)
            }
            Self::In {
                path,
                values,
                negated,
            } => ConditionEvaluator::in_list(path.resolve(record), values) != *negated,
            Self::IsNull { path, negated } => path.resolve(record).is_null() != *negated,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant { value } => write!(f, "{}", value),
            Self::Group { operator, children } => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", operator)?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            Self::Not { operand } => write!(f, "NOT {}", operand),
            Self::Compare {
                path,
                operator,
                value,
            } => write!(f, "{} {} {}", path, operator, value),
            Self::Like { path, mode, value } => write!(f, "{} {} '{}'", path, mode, value),
            Self::In {
                path,
                values,
                negated,
            } => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                let keyword = if *negated { "NOT IN" } else { "IN" };
                write!(f, "{} {} ({})", path, keyword, items.join(", "))
            }
            Self::IsNull { path, negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                write!(f, "{} {}", path, keyword)
            }
        }
    }
}

/// 与具体事实类型解耦的谓词
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    shape: String,
    root: Expr,
}

impl Predicate {
    pub fn new(shape: impl Into<String>, root: Expr) -> Self {
        Self {
            shape: shape.into(),
            root,
        }
    }

    pub fn shape(&self) -> &str {
        &self.shape
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    pub fn evaluate(&self, record: &dyn Record) -> bool {
        self.root.evaluate(record)
    }

    /// 谓词是否针对形状 `F` 编译
    pub fn applies_to<F: FactShape>(&self) -> bool {
        self.shape == F::SHAPE_NAME
    }
}

/// 面向事实类型 `F` 的谓词
pub struct CompiledPredicate<F> {
    predicate: Predicate,
    _shape: PhantomData<fn(&F) -> bool>,
}

impl<F: FactShape> CompiledPredicate<F> {
    pub(crate) fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            _shape: PhantomData,
        }
    }

    /// 从持久化的谓词恢复；形状不符时返回 `None`
    pub fn from_predicate(predicate: Predicate) -> Option<Self> {
        predicate.applies_to::<F>().then(|| Self::new(predicate))
    }

    pub fn matches(&self, fact: &F) -> bool {
        self.predicate.evaluate(fact)
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn into_predicate(self) -> Predicate {
        self.predicate
    }
}

impl<F> Clone for CompiledPredicate<F> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            _shape: PhantomData,
        }
    }
}

impl<F> fmt::Debug for CompiledPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPredicate")
            .field("shape", &self.predicate.shape)
            .field("root", &self.predicate.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::FieldDescriptor;

    struct Address {
        city: String,
    }

    impl Record for Address {
        fn field_value(&self, field: &str) -> FieldValue<'_> {
            match field {
                "City" => FieldValue::from(&self.city),
                _ => FieldValue::Null,
            }
        }
    }

    struct Person {
        name: Option<String>,
        address: Option<Address>,
    }

    impl Record for Person {
        fn field_value(&self, field: &str) -> FieldValue<'_> {
            match field {
                "Name" => FieldValue::from(self.name.as_ref()),
                "Address" => FieldValue::record(self.address.as_ref()),
                _ => FieldValue::Null,
            }
        }
    }

    impl FactShape for Person {
        const SHAPE_NAME: &'static str = "Person";

        fn fields() -> Vec<FieldDescriptor> {
            vec![FieldDescriptor::string("Name").nullable()]
        }
    }

    fn path(segments: &[&str]) -> FieldPath {
        FieldPath::new(segments.iter().map(|s| s.to_string()).collect())
    }

    fn city_is(city: &str) -> Expr {
        Expr::Compare {
            path: path(&["Address", "City"]),
            operator: CompareOp::Eq,
            value: Literal::Str(city.to_string()),
        }
    }

    #[test]
    fn test_nested_path_resolution() {
        let person = Person {
            name: None,
            address: Some(Address {
                city: "Springfield".to_string(),
            }),
        };
        let homeless = Person {
            name: None,
            address: None,
        };

        assert!(city_is("Springfield").evaluate(&person));
        assert!(!city_is("Springfield").evaluate(&homeless));
        assert!(path(&["Address", "City"]).resolve(&homeless).is_null());
    }

    #[test]
    fn test_group_and_not() {
        let person = Person {
            name: Some("Ann".to_string()),
            address: None,
        };
        let name_is_null = Expr::IsNull {
            path: path(&["Name"]),
            negated: false,
        };

        let either = Expr::Group {
            operator: LogicalOperator::Or,
            children: vec![name_is_null.clone(), city_is("Springfield")],
        };
        let not_null = Expr::Not {
            operand: Box::new(name_is_null),
        };

        assert!(!either.evaluate(&person));
        assert!(not_null.evaluate(&person));
    }

    #[test]
    fn test_display_and_json_form() {
        let expr = Expr::Group {
            operator: LogicalOperator::And,
            children: vec![
                city_is("O'Fallon"),
                Expr::In {
                    path: path(&["Name"]),
                    values: vec![Literal::Str("A".to_string())],
                    negated: true,
                },
            ],
        };

        assert_eq!(
            expr.to_string(),
            "(Address.City == 'O''Fallon' AND Name NOT IN ('A'))"
        );

        let predicate = Predicate::new("Person", expr);
        let json = serde_json::to_string(&predicate).unwrap();
        let restored: Predicate = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, predicate);
    }

    #[test]
    fn test_typed_predicate_checks_shape() {
        let matching = Predicate::new("Person", Expr::Constant { value: true });
        let other = Predicate::new("Encounter", Expr::Constant { value: true });

        let typed = CompiledPredicate::<Person>::from_predicate(matching).unwrap();
        assert!(typed.matches(&Person {
            name: None,
            address: None
        }));
        assert!(CompiledPredicate::<Person>::from_predicate(other).is_none());
    }
}
