//! 规则目录导入
//!
//! 把调用方提供的规则定义幂等地写入规则存储：同名规则已存在时跳过，
//! 否则编译并保存。重复执行不会产生多于目录条目数的记录。

use crate::engine::DynamicRulesEngine;
use crate::error::{Result, ensure_active};
use crate::models::RuleDefinition;
use crate::shape::FactShape;
use crate::store::RuleStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// 规则目录：一个规则集键下的规则定义列表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCatalog<O> {
    pub rule_set_key: String,
    pub rules: Vec<RuleDefinition<O>>,
}

impl<O: DeserializeOwned> RuleCatalog<O> {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_json(&text)?;
        info!(
            path = %path.as_ref().display(),
            rule_set_key = %catalog.rule_set_key,
            rules = catalog.rules.len(),
            "规则目录已加载"
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// 导入统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub created: usize,
    pub skipped: usize,
}

/// 规则导入服务
pub struct RuleIngestionService<F, O> {
    engine: Arc<DynamicRulesEngine<F, O>>,
    store: Arc<dyn RuleStore>,
}

impl<F, O> RuleIngestionService<F, O>
where
    F: FactShape,
    O: Serialize + DeserializeOwned,
{
    pub fn new(engine: Arc<DynamicRulesEngine<F, O>>, store: Arc<dyn RuleStore>) -> Self {
        Self { engine, store }
    }

    /// 导入目录；任一规则编译失败即中止并返回错误
    #[instrument(skip(self, catalog, cancel), fields(rule_set_key = %catalog.rule_set_key))]
    pub fn ingest(
        &self,
        catalog: &RuleCatalog<O>,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport> {
        let mut report = IngestionReport::default();

        for definition in &catalog.rules {
            ensure_active(cancel)?;

            let existing = self
                .store
                .get(&catalog.rule_set_key, &definition.rule_name, cancel)?;
            if existing.is_some() {
                debug!(rule_name = %definition.rule_name, "规则已存在，跳过");
                report.skipped += 1;
                continue;
            }

            let rule = self.engine.create_rule(
                &catalog.rule_set_key,
                &definition.rule_sql,
                &definition.output,
                definition.options(),
                cancel,
            )?;
            self.store.save(&catalog.rule_set_key, rule, cancel)?;
            report.created += 1;
        }

        info!(
            created = report.created,
            skipped = report.skipped,
            "规则目录导入完成"
        );
        Ok(report)
    }
}
