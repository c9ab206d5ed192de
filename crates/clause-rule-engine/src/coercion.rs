//! 字面量类型转换
//!
//! 条件中的字面量一律以文本形式出现，编译时按目标字段的类型转换为 [`Literal`]。
//! 数值解析与区域设置无关；整数按字段宽度做范围检查。

use crate::error::CompilationError;
use crate::shape::{FieldType, FloatWidth, IntWidth};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 已绑定类型的字面量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Str(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    DateTime(DateTime<Utc>),
    DateTimeOffset(DateTime<FixedOffset>),
    Uuid(Uuid),
    /// 枚举成员序数
    Enum(i64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "'{}'", v.to_rfc3339()),
            Self::DateTimeOffset(v) => write!(f, "'{}'", v.to_rfc3339()),
            Self::Uuid(v) => write!(f, "'{}'", v),
            Self::Enum(v) => write!(f, "#{}", v),
        }
    }
}

/// naive 时间格式，按 UTC 解释
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// 将字面量文本转换为目标字段类型
pub fn coerce(text: &str, field_type: &FieldType) -> Result<Literal, CompilationError> {
    let failed = || CompilationError::LiteralConversion {
        value: text.to_string(),
        target: field_type.to_string(),
    };

    match field_type {
        FieldType::String => Ok(Literal::Str(text.to_string())),
        FieldType::Boolean => {
            let trimmed = text.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(Literal::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(Literal::Bool(false))
            } else {
                Err(failed())
            }
        }
        FieldType::Integer(width) => coerce_integer(text, *width).ok_or_else(failed),
        FieldType::Float(width) => coerce_float(text, *width).ok_or_else(failed),
        FieldType::DateTime => parse_timestamp(text)
            .map(|ts| Literal::DateTime(ts.with_timezone(&Utc)))
            .ok_or_else(failed),
        FieldType::DateTimeOffset => parse_timestamp(text)
            .map(Literal::DateTimeOffset)
            .ok_or_else(failed),
        FieldType::Uuid => Uuid::parse_str(text.trim())
            .map(Literal::Uuid)
            .map_err(|_| failed()),
        FieldType::Enum(def) => {
            let trimmed = text.trim();
            let ordinal = match def.ordinal_of(trimmed) {
                Some(ordinal) => Some(ordinal),
                None => trimmed
                    .parse::<i64>()
                    .ok()
                    .filter(|n| def.members.iter().any(|(_, ordinal)| ordinal == n)),
            };
            ordinal.map(Literal::Enum).ok_or_else(failed)
        }
        FieldType::Nested(_) => Err(failed()),
    }
}

fn coerce_integer(text: &str, width: IntWidth) -> Option<Literal> {
    let trimmed = text.trim();
    let value = match trimmed.parse::<i128>() {
        Ok(value) => value,
        Err(_) => {
            // 带小数的整数字面量按银行家舍入取整
            let float = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
            let rounded = float.round_ties_even();
            if rounded < i128::MIN as f64 || rounded > i128::MAX as f64 {
                return None;
            }
            rounded as i128
        }
    };

    let (min, max) = width.bounds();
    if value < min || value > max {
        return None;
    }

    if width.is_signed() {
        i64::try_from(value).ok().map(Literal::Int)
    } else {
        u64::try_from(value).ok().map(Literal::UInt)
    }
}

fn coerce_float(text: &str, width: FloatWidth) -> Option<Literal> {
    let value = text.trim().parse::<f64>().ok().filter(|f| f.is_finite())?;
    match width {
        FloatWidth::F64 => Some(Literal::Float(value)),
        FloatWidth::F32 => {
            let narrowed = value as f32;
            narrowed
                .is_finite()
                .then_some(Literal::Float(narrowed as f64))
        }
    }
}

/// ISO-8601 时间解析；无时区信息按 UTC，仅日期视为当日零点
fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed);
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}
