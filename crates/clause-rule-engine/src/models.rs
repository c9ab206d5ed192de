//! 规则引擎领域模型

use crate::error::Result;
use crate::predicate::Predicate;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 已存储的规则记录
///
/// 创建后不可变；以相同名称重新注册会整体替换旧记录。
/// 持久化形式中谓词以 JSON 文本保存在 `rule_json` 字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRule {
    name: String,
    condition: String,
    #[serde(rename = "rule_json", with = "predicate_json")]
    predicate: Predicate,
    output_json: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    rule_serialization: Option<String>,
    #[serde(default)]
    metadata: Option<RuleMetadata>,
}

impl StoredRule {
    pub fn new(
        name: impl Into<String>,
        condition: impl Into<String>,
        predicate: Predicate,
        output_json: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
            predicate,
            output_json,
            domain: None,
            description: None,
            rule_serialization: None,
            metadata: None,
        }
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_rule_serialization(mut self, rule_serialization: Option<String>) -> Self {
        self.rule_serialization = rule_serialization;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<RuleMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 原始条件文本
    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn output_json(&self) -> Option<&str> {
        self.output_json.as_deref()
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn rule_serialization(&self) -> Option<&str> {
        self.rule_serialization.as_deref()
    }

    pub fn metadata(&self) -> Option<&RuleMetadata> {
        self.metadata.as_ref()
    }

    /// 谓词的持久化 JSON
    pub fn rule_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.predicate)?)
    }

    /// 还原输出；缺失或为 JSON `null` 时返回 `None`
    pub fn output<O: DeserializeOwned>(&self) -> Result<Option<O>> {
        match self.output_json.as_deref() {
            None => Ok(None),
            Some(text) => Ok(serde_json::from_str::<Option<O>>(text)?),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 从持久化 JSON 重建，谓词直接还原而不重新编译条件
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

mod predicate_json {
    use crate::predicate::Predicate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        predicate: &Predicate,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let text = serde_json::to_string(predicate).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Predicate, D::Error> {
        let text = String::deserialize(deserializer)?;
        serde_json::from_str(&text).map_err(serde::de::Error::custom)
    }
}

/// 规则元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMetadata {
    pub author: RuleContact,
    pub created_at: DateTime<Utc>,
    pub last_updated_by: RuleContact,
    pub last_updated_at: DateTime<Utc>,
    pub version: RuleVersion,
    #[serde(default)]
    pub previous_version: Option<RuleVersion>,
    #[serde(default)]
    pub tags: Vec<RuleTag>,
}

impl RuleMetadata {
    /// 按分类查找标签值
    pub fn tag(&self, category: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.category == category)
            .map(|tag| tag.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleContact {
    pub name: String,
    pub email: String,
}

/// 语义化版本及变更说明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub change_type: String,
    pub change_reason: String,
}

impl fmt::Display for RuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTag {
    pub category: String,
    pub value: String,
}

impl RuleTag {
    pub fn new(category: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
        }
    }
}

/// 创建规则时的可选参数
#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub rule_serialization: Option<String>,
    pub metadata: Option<RuleMetadata>,
}

impl RuleOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_rule_serialization(mut self, rule_serialization: impl Into<String>) -> Self {
        self.rule_serialization = Some(rule_serialization.into());
        self
    }

    pub fn with_metadata(mut self, metadata: RuleMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// 外部提供的规则定义（规则目录中的一项）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition<O> {
    #[serde(default)]
    pub domain: Option<String>,
    pub rule_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rule_sql: String,
    #[serde(default)]
    pub rule_serialization: Option<String>,
    #[serde(default)]
    pub metadata: Option<RuleMetadata>,
    pub output: O,
}

impl<O> RuleDefinition<O> {
    pub fn options(&self) -> RuleOptions {
        RuleOptions {
            name: Some(self.rule_name.clone()),
            domain: self.domain.clone(),
            description: self.description.clone(),
            rule_serialization: self.rule_serialization.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// 单条规则命中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch<O> {
    pub rule_name: String,
    pub output: O,
}

/// 评估结果
#[derive(Debug)]
pub struct EvaluationResult<'f, F, O> {
    fact: &'f F,
    matches: Vec<RuleMatch<O>>,
}

impl<'f, F, O> EvaluationResult<'f, F, O> {
    pub fn new(fact: &'f F, matches: Vec<RuleMatch<O>>) -> Self {
        Self { fact, matches }
    }

    pub fn fact(&self) -> &'f F {
        self.fact
    }

    /// 命中列表，顺序不属于契约
    pub fn matches(&self) -> &[RuleMatch<O>] {
        &self.matches
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn into_matches(self) -> Vec<RuleMatch<O>> {
        self.matches
    }
}
