//! 条件规则引擎命令行
//!
//! 导入规则目录后，对事实文件中的每个事实评估规则集，每个事实输出一行 JSON。

use anyhow::{Context, Result, bail};
use clause_shared::config::{AppConfig, EngineConfig};
use clause_shared::observability;
use rule_engine::shapes::{CptCodeOutput, Encounter, builtin_registry};
use rule_engine::{
    DynamicRulesEngine, FactShape, InMemoryRuleStore, RuleCatalog, RuleIngestionService, RuleMatch,
    RuleStore, telemetry,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 单个事实的评估输出
#[derive(Serialize)]
struct FactReport<'a, O> {
    index: usize,
    matches: &'a [RuleMatch<O>],
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("clause-rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    observability::init(&config.observability)?;
    telemetry::describe();

    info!(
        service = %config.service_name,
        environment = %config.environment,
        "Starting clause-rule-engine..."
    );

    let shape = builtin_registry().get(&config.engine.fact_shape)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let engine_config = config.engine.clone();
    let worker_cancel = cancel.clone();
    tokio::task::spawn_blocking(move || {
        if shape.name() == Encounter::SHAPE_NAME {
            run::<Encounter, CptCodeOutput>(&engine_config, &worker_cancel)
        } else {
            bail!("No output type is bound to fact shape '{}'", shape.name())
        }
    })
    .await??;

    info!("Shutdown complete");
    Ok(())
}

/// 导入目录并逐个评估事实
fn run<F, O>(config: &EngineConfig, cancel: &CancellationToken) -> Result<()>
where
    F: FactShape + DeserializeOwned,
    O: Serialize + DeserializeOwned,
{
    let store: Arc<dyn RuleStore> = Arc::new(InMemoryRuleStore::new());
    let engine = Arc::new(DynamicRulesEngine::<F, O>::new(store.clone()));

    match &config.catalog_path {
        Some(path) => {
            let catalog = RuleCatalog::<O>::load(path)
                .with_context(|| format!("Failed to load rule catalog from {}", path))?;
            let report = RuleIngestionService::new(engine.clone(), store.clone())
                .ingest(&catalog, cancel)?;
            info!(
                rule_set_key = %catalog.rule_set_key,
                created = report.created,
                skipped = report.skipped,
                "Rule catalog ingested"
            );
            if catalog.rule_set_key != config.rule_set_key {
                warn!(
                    catalog_key = %catalog.rule_set_key,
                    configured_key = %config.rule_set_key,
                    "Catalog rule set key differs from the configured key"
                );
            }
        }
        None => warn!("No catalog_path configured, rule set is empty"),
    }

    let Some(path) = &config.facts_path else {
        info!("No facts_path configured, nothing to evaluate");
        return Ok(());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read facts from {}", path))?;
    let facts: Vec<F> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse facts in {}", path))?;

    for (index, fact) in facts.iter().enumerate() {
        let result = engine.evaluate(&config.rule_set_key, fact, cancel)?;
        let line = serde_json::to_string(&FactReport {
            index,
            matches: result.matches(),
        })?;
        println!("{}", line);
    }

    info!(facts = facts.len(), "Evaluation complete");
    Ok(())
}

/// 收到 Ctrl+C 时取消进行中的操作
async fn shutdown_signal(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, cancelling...");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to install Ctrl+C handler"),
    }
}
