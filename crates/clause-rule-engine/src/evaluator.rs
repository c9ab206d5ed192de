//! 条件评估器
//!
//! 对单个叶子条件求值：字段运行时值与编译期已转换的字面量比较。
//! 空值永远不等于任何字面量，因此 `=`、大小比较、LIKE、IN 遇到空值为假，`!=` 为真。

use crate::coercion::Literal;
use crate::operators::{CompareOp, LikeMatch};
use crate::shape::FieldValue;
use chrono::Utc;
use std::cmp::Ordering;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 比较求值
    ///
    /// # Arguments
    /// * `value` - 从事实中解析出的字段值
    /// * `operator` - 比较操作符
    /// * `literal` - 规则中定义的期望值
    pub fn compare(value: FieldValue<'_>, operator: CompareOp, literal: &Literal) -> bool {
        match Self::ordering(value, literal) {
            Some(ordering) => match operator {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::Neq => ordering != Ordering::Equal,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Gte => ordering != Ordering::Less,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Lte => ordering != Ordering::Greater,
            },
            // 空值或类型不可比较
            None => operator == CompareOp::Neq,
        }
    }

    /// LIKE 求值，只对字符串值成立
    pub fn like(value: FieldValue<'_>, mode: LikeMatch, pattern: &str) -> bool {
        let FieldValue::Str(text) = value else {
            return false;
        };

        match mode {
            LikeMatch::StartsWith => text.starts_with(pattern),
            LikeMatch::EndsWith => text.ends_with(pattern),
            LikeMatch::Contains => text.contains(pattern),
            LikeMatch::Exact => text == pattern,
        }
    }

    /// 集合成员检查（不含取反）
    pub fn in_list(value: FieldValue<'_>, values: &[Literal]) -> bool {
        values
            .iter()
            .any(|literal| Self::ordering(value, literal) == Some(Ordering::Equal))
    }

    /// 字段值与字面量的全序关系；空值或类型不匹配返回 `None`
    fn ordering(value: FieldValue<'_>, literal: &Literal) -> Option<Ordering> {
        match (value, literal) {
            (FieldValue::Str(a), Literal::Str(b)) => Some(a.cmp(b.as_str())),
            (FieldValue::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),

            (FieldValue::Int(a), Literal::Int(b)) => Some(a.cmp(b)),
            (FieldValue::UInt(a), Literal::UInt(b)) => Some(a.cmp(b)),
            (FieldValue::Int(a), Literal::UInt(b)) => Some(i128::from(a).cmp(&i128::from(*b))),
            (FieldValue::UInt(a), Literal::Int(b)) => Some(i128::from(a).cmp(&i128::from(*b))),
            (FieldValue::Float(a), Literal::Float(b)) => a.partial_cmp(b),
            (FieldValue::Float(a), Literal::Int(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Float(a), Literal::UInt(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Int(a), Literal::Float(b)) => (a as f64).partial_cmp(b),
            (FieldValue::UInt(a), Literal::Float(b)) => (a as f64).partial_cmp(b),

            (FieldValue::DateTime(a), Literal::DateTime(b)) => Some(a.cmp(b)),
            (FieldValue::DateTime(a), Literal::DateTimeOffset(b)) => {
                Some(a.cmp(&b.with_timezone(&Utc)))
            }
            (FieldValue::DateTimeOffset(a), Literal::DateTimeOffset(b)) => Some(a.cmp(b)),
            (FieldValue::DateTimeOffset(a), Literal::DateTime(b)) => {
                Some(a.with_timezone(&Utc).cmp(b))
            }

            (FieldValue::Uuid(a), Literal::Uuid(b)) => Some(a.cmp(b)),

            (FieldValue::Enum(a), Literal::Enum(b)) => Some(a.cmp(b)),
            (FieldValue::Int(a), Literal::Enum(b)) => Some(a.cmp(b)),
            (FieldValue::Enum(a), Literal::Int(b)) => Some(a.cmp(b)),

            _ => None,
        }
    }
}
