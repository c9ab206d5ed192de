//! 动态规则引擎
//!
//! 负责编译条件、写入规则存储以及对单个事实评估整个规则集。
//! 评估直接对每条规则的谓词求值，规则之间没有推理链。

use crate::compiler::ConditionCompiler;
use crate::error::{Result, ensure_active};
use crate::models::{EvaluationResult, RuleMatch, RuleOptions, StoredRule};
use crate::shape::FactShape;
use crate::store::RuleStore;
use crate::telemetry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 面向事实类型 `F`、输出类型 `O` 的规则引擎
pub struct DynamicRulesEngine<F, O> {
    store: Arc<dyn RuleStore>,
    compiler: ConditionCompiler,
    _types: PhantomData<fn(&F) -> O>,
}

impl<F, O> DynamicRulesEngine<F, O>
where
    F: FactShape,
    O: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self::with_compiler(store, ConditionCompiler::new())
    }

    pub fn with_compiler(store: Arc<dyn RuleStore>, compiler: ConditionCompiler) -> Self {
        Self {
            store,
            compiler,
            _types: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    /// 编译条件并保存规则
    ///
    /// 编译失败或已取消时不会写入任何记录。
    #[instrument(skip(self, output, options, cancel), fields(shape = F::SHAPE_NAME))]
    pub fn create_rule(
        &self,
        rule_set_key: &str,
        condition: &str,
        output: &O,
        options: RuleOptions,
        cancel: &CancellationToken,
    ) -> Result<Arc<StoredRule>> {
        ensure_active(cancel)?;

        let predicate = self.compiler.compile::<F>(condition)?;
        let name = effective_name(options.name.as_deref(), condition);
        let output_json = serde_json::to_string(output)?;

        let rule = Arc::new(
            StoredRule::new(name, condition, predicate.into_predicate(), Some(output_json))
                .with_domain(options.domain)
                .with_description(options.description)
                .with_rule_serialization(options.rule_serialization)
                .with_metadata(options.metadata),
        );

        ensure_active(cancel)?;
        self.store.save(rule_set_key, Arc::clone(&rule), cancel)?;

        telemetry::record_rule_created(rule_set_key);
        info!(rule_name = %rule.name(), "规则已创建");
        Ok(rule)
    }

    /// 对规则集评估单个事实
    ///
    /// 规则集为空或不存在时返回空结果；输出无法还原的规则被跳过。
    #[instrument(skip(self, fact, cancel), fields(shape = F::SHAPE_NAME))]
    pub fn evaluate<'f>(
        &self,
        rule_set_key: &str,
        fact: &'f F,
        cancel: &CancellationToken,
    ) -> Result<EvaluationResult<'f, F, O>> {
        ensure_active(cancel)?;
        let started = Instant::now();

        let rules = self.store.get_all(rule_set_key, cancel)?;
        let mut matches = Vec::new();

        for rule in &rules {
            if !rule.predicate().applies_to::<F>() {
                debug!(
                    rule_name = %rule.name(),
                    rule_shape = rule.predicate().shape(),
                    "规则形状不符，已忽略"
                );
                continue;
            }

            if !rule.predicate().evaluate(fact) {
                continue;
            }

            match rule.output::<O>() {
                Ok(Some(output)) => matches.push(RuleMatch {
                    rule_name: rule.name().to_string(),
                    output,
                }),
                Ok(None) => {
                    warn!(rule_name = %rule.name(), "规则输出为空，已跳过");
                    telemetry::record_skipped_output(rule_set_key);
                }
                Err(e) => {
                    warn!(rule_name = %rule.name(), error = %e, "规则输出无法还原，已跳过");
                    telemetry::record_skipped_output(rule_set_key);
                }
            }
        }

        telemetry::record_evaluation(rule_set_key, matches.len(), started.elapsed().as_secs_f64());
        debug!(rules = rules.len(), matched = matches.len(), "规则集评估完成");

        Ok(EvaluationResult::new(fact, matches))
    }
}

/// 未指定名称时使用条件文本生成名称；条件也为空时使用随机标识
fn effective_name(name: Option<&str>, condition: &str) -> String {
    match name.filter(|n| !n.trim().is_empty()) {
        Some(name) => name.to_string(),
        None if condition.trim().is_empty() => Uuid::new_v4().simple().to_string(),
        None => format!("Dynamic Rule: {}", condition),
    }
}
