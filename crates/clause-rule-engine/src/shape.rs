//! 事实形状定义
//!
//! 规则条件针对的记录类型（形状）在这里以显式字段表的方式声明，
//! 编译器只通过字段描述符和 [`Record::field_value`] 访问事实数据，不依赖运行时反射。

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;
use uuid::Uuid;

/// 整数字段宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// 取值范围（闭区间）
    pub fn bounds(self) -> (i128, i128) {
        match self {
            Self::I8 => (i8::MIN as i128, i8::MAX as i128),
            Self::I16 => (i16::MIN as i128, i16::MAX as i128),
            Self::I32 => (i32::MIN as i128, i32::MAX as i128),
            Self::I64 => (i64::MIN as i128, i64::MAX as i128),
            Self::U8 => (0, u8::MAX as i128),
            Self::U16 => (0, u16::MAX as i128),
            Self::U32 => (0, u32::MAX as i128),
            Self::U64 => (0, u64::MAX as i128),
        }
    }
}

impl fmt::Display for IntWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
        };
        write!(f, "{}", s)
    }
}

/// 浮点字段宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatWidth {
    F32,
    F64,
}

impl fmt::Display for FloatWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
        }
    }
}

/// 枚举类型定义：成员名称与其序数
#[derive(Debug)]
pub struct EnumDef {
    pub name: &'static str,
    pub members: &'static [(&'static str, i64)],
}

impl EnumDef {
    /// 按成员名称（不区分大小写）查找序数
    pub fn ordinal_of(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(member))
            .map(|(_, ordinal)| *ordinal)
    }
}

/// 字段语义类型
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    String,
    Boolean,
    Integer(IntWidth),
    Float(FloatWidth),
    DateTime,
    DateTimeOffset,
    Uuid,
    Enum(&'static EnumDef),
    Nested(ShapeRef),
}

impl FieldType {
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "String"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Integer(width) => write!(f, "{}", width),
            Self::Float(width) => write!(f, "{}", width),
            Self::DateTime => write!(f, "DateTime"),
            Self::DateTimeOffset => write!(f, "DateTimeOffset"),
            Self::Uuid => write!(f, "Uuid"),
            Self::Enum(def) => write!(f, "enum '{}'", def.name),
            Self::Nested(shape) => write!(f, "{}", shape.name()),
        }
    }
}

/// 字段描述符，构建后不可变
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    field_type: FieldType,
    nullable: bool,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: false,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: &'static str, width: IntWidth) -> Self {
        Self::new(name, FieldType::Integer(width))
    }

    pub fn float(name: &'static str, width: FloatWidth) -> Self {
        Self::new(name, FieldType::Float(width))
    }

    pub fn nested<S: FactShape>(name: &'static str) -> Self {
        Self::new(name, FieldType::Nested(ShapeRef::of::<S>()))
    }

    /// 标记为可空（对应 `Option<T>` 字段）
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// 嵌套形状（点号路径的下一段在此形状上解析）
    pub fn nested_shape(&self) -> Option<ShapeRef> {
        match self.field_type {
            FieldType::Nested(shape) => Some(shape),
            _ => None,
        }
    }
}

/// 形状引用：形状的身份、名称以及字段表构造函数
#[derive(Debug, Clone, Copy)]
pub struct ShapeRef {
    type_id: TypeId,
    name: &'static str,
    fields: fn() -> Vec<FieldDescriptor>,
}

impl ShapeRef {
    pub fn of<S: FactShape>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: S::SHAPE_NAME,
            fields: S::fields,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> Vec<FieldDescriptor> {
        (self.fields)()
    }
}

impl PartialEq for ShapeRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ShapeRef {}

/// 运行时字段值
#[derive(Clone, Copy)]
pub enum FieldValue<'a> {
    Null,
    Str(&'a str),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    DateTime(DateTime<Utc>),
    DateTimeOffset(DateTime<FixedOffset>),
    Uuid(Uuid),
    /// 枚举成员序数
    Enum(i64),
    Record(&'a dyn Record),
}

impl<'a> FieldValue<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 可空嵌套记录
    pub fn record<R: Record>(value: Option<&'a R>) -> Self {
        match value {
            Some(record) => Self::Record(record),
            None => Self::Null,
        }
    }
}

impl fmt::Debug for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::UInt(v) => f.debug_tuple("UInt").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::DateTime(v) => f.debug_tuple("DateTime").field(v).finish(),
            Self::DateTimeOffset(v) => f.debug_tuple("DateTimeOffset").field(v).finish(),
            Self::Uuid(v) => f.debug_tuple("Uuid").field(v).finish(),
            Self::Enum(v) => f.debug_tuple("Enum").field(v).finish(),
            Self::Record(_) => write!(f, "Record(..)"),
        }
    }
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(value: &'a str) -> Self {
        Self::Str(value)
    }
}

impl<'a> From<&'a String> for FieldValue<'a> {
    fn from(value: &'a String) -> Self {
        Self::Str(value.as_str())
    }
}

impl From<bool> for FieldValue<'_> {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue<'_> {
            fn from(value: $t) -> Self {
                Self::Int(value as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue<'_> {
            fn from(value: $t) -> Self {
                Self::UInt(value as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<f32> for FieldValue<'_> {
    fn from(value: f32) -> Self {
        Self::Float(value as f64)
    }
}

impl From<f64> for FieldValue<'_> {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<DateTime<Utc>> for FieldValue<'_> {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue<'_> {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTimeOffset(value)
    }
}

impl From<Uuid> for FieldValue<'_> {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl<'a, T: Into<FieldValue<'a>>> From<Option<T>> for FieldValue<'a> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// 可被谓词读取的记录
///
/// `field` 总是字段的声明名称（别名已在编译期解析）；未知字段返回 [`FieldValue::Null`]。
pub trait Record {
    fn field_value(&self, field: &str) -> FieldValue<'_>;
}

/// 可作为编译目标的事实形状
pub trait FactShape: Record + Send + Sync + 'static {
    const SHAPE_NAME: &'static str;

    /// 字段表，每个形状只会被元数据缓存调用一次
    fn fields() -> Vec<FieldDescriptor>;
}
