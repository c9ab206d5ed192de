//! 规则存储管理
//!
//! 按规则集键分组保存规则记录。所有读写经过同一把读写锁，
//! `get_all` 返回的快照是记录句柄的副本，之后的写入不会反映到已返回的快照中。

use crate::error::{Result, ensure_active};
use crate::models::StoredRule;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// 规则存储抽象
#[cfg_attr(test, mockall::automock)]
pub trait RuleStore: Send + Sync {
    /// 按名称插入或覆盖
    fn save(
        &self,
        rule_set_key: &str,
        rule: Arc<StoredRule>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// 规则集的时间点快照；规则集不存在时为空
    fn get_all(
        &self,
        rule_set_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<StoredRule>>>;

    /// 按名称查找；不存在不是错误
    fn get(
        &self,
        rule_set_key: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<StoredRule>>>;
}

type RuleSets = HashMap<String, HashMap<String, Arc<StoredRule>>>;

/// 进程内规则存储
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rule_sets: RwLock<RuleSets>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用初始规则集创建；同一规则集内重名时后出现的记录生效
    pub fn with_rule_sets<I, R>(initial: I) -> Self
    where
        I: IntoIterator<Item = (String, R)>,
        R: IntoIterator<Item = StoredRule>,
    {
        let mut rule_sets = RuleSets::new();
        for (key, rules) in initial {
            let set = rule_sets.entry(key).or_default();
            for rule in rules {
                set.insert(rule.name().to_string(), Arc::new(rule));
            }
        }

        Self {
            rule_sets: RwLock::new(rule_sets),
        }
    }

    /// 规则集内的记录数
    pub fn rule_count(&self, rule_set_key: &str) -> usize {
        self.rule_sets
            .read()
            .get(rule_set_key)
            .map_or(0, HashMap::len)
    }

    /// 所有规则集键（排序后）
    pub fn rule_set_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.rule_sets.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }
}

impl RuleStore for InMemoryRuleStore {
    #[instrument(skip(self, rule, cancel), fields(rule_name = %rule.name()))]
    fn save(
        &self,
        rule_set_key: &str,
        rule: Arc<StoredRule>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_active(cancel)?;

        let replaced = self
            .rule_sets
            .write()
            .entry(rule_set_key.to_string())
            .or_default()
            .insert(rule.name().to_string(), rule)
            .is_some();

        if replaced {
            info!("规则已覆盖");
        } else {
            info!("规则已保存");
        }
        Ok(())
    }

    #[instrument(skip(self, cancel))]
    fn get_all(
        &self,
        rule_set_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<StoredRule>>> {
        ensure_active(cancel)?;

        let snapshot: Vec<_> = self
            .rule_sets
            .read()
            .get(rule_set_key)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default();

        debug!(count = snapshot.len(), "读取规则集快照");
        Ok(snapshot)
    }

    #[instrument(skip(self, cancel))]
    fn get(
        &self,
        rule_set_key: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<StoredRule>>> {
        ensure_active(cancel)?;

        Ok(self
            .rule_sets
            .read()
            .get(rule_set_key)
            .and_then(|set| set.get(name))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::predicate::{Expr, Predicate};
    use std::thread;

    fn sample_rule(name: &str, condition: &str) -> StoredRule {
        StoredRule::new(
            name,
            condition,
            Predicate::new("Encounter", Expr::Constant { value: true }),
            Some("[]".to_string()),
        )
    }

    #[test]
    fn test_save_and_get() {
        let store = InMemoryRuleStore::new();
        let cancel = CancellationToken::new();

        store
            .save("cpt", Arc::new(sample_rule("Group Therapy", "a")), &cancel)
            .unwrap();

        let found = store.get("cpt", "Group Therapy", &cancel).unwrap().unwrap();
        assert_eq!(found.condition(), "a");
        assert!(store.get("cpt", "Missing", &cancel).unwrap().is_none());
        assert!(store.get("other", "Group Therapy", &cancel).unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_by_name() {
        let store = InMemoryRuleStore::new();
        let cancel = CancellationToken::new();

        store
            .save("cpt", Arc::new(sample_rule("Intake", "old")), &cancel)
            .unwrap();
        store
            .save("cpt", Arc::new(sample_rule("Intake", "new")), &cancel)
            .unwrap();

        assert_eq!(store.rule_count("cpt"), 1);
        let found = store.get("cpt", "Intake", &cancel).unwrap().unwrap();
        assert_eq!(found.condition(), "new");
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let store = InMemoryRuleStore::new();
        let cancel = CancellationToken::new();

        store
            .save("cpt", Arc::new(sample_rule("A", "a")), &cancel)
            .unwrap();
        let snapshot = store.get_all("cpt", &cancel).unwrap();

        store
            .save("cpt", Arc::new(sample_rule("B", "b")), &cancel)
            .unwrap();
        store
            .save("cpt", Arc::new(sample_rule("A", "changed")), &cancel)
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].condition(), "a");
        assert_eq!(store.get_all("cpt", &cancel).unwrap().len(), 2);
        assert!(store.get_all("missing", &cancel).unwrap().is_empty());
    }

    #[test]
    fn test_initial_rule_sets() {
        let store = InMemoryRuleStore::with_rule_sets([
            (
                "cpt".to_string(),
                vec![sample_rule("A", "a"), sample_rule("B", "b")],
            ),
            ("audit".to_string(), vec![]),
        ]);

        assert_eq!(store.rule_count("cpt"), 2);
        assert_eq!(store.rule_count("audit"), 0);
        assert_eq!(store.rule_set_keys(), vec!["audit", "cpt"]);
    }

    #[test]
    fn test_cancelled_operations() {
        let store = InMemoryRuleStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = store.save("cpt", Arc::new(sample_rule("A", "a")), &cancel);
        assert!(matches!(result, Err(RuleError::Cancelled)));
        assert!(matches!(
            store.get_all("cpt", &cancel),
            Err(RuleError::Cancelled)
        ));
        assert_eq!(store.rule_count("cpt"), 0);
    }

    #[test]
    fn test_concurrent_save_and_get_all() {
        let store = Arc::new(InMemoryRuleStore::new());

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let cancel = CancellationToken::new();
                    for i in 0..50 {
                        let rule = sample_rule(&format!("rule-{}-{}", writer, i), "x");
                        store.save("cpt", Arc::new(rule), &cancel).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let cancel = CancellationToken::new();
                let mut last = 0;
                for _ in 0..100 {
                    let snapshot = store.get_all("cpt", &cancel).unwrap();
                    // 只增不减
                    assert!(snapshot.len() >= last);
                    last = snapshot.len();
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(store.rule_count("cpt"), 200);
    }
}
