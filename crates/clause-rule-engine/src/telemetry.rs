//! 规则引擎指标
//!
//! 只通过 metrics 门面记录，导出器由宿主进程安装。

/// 注册指标描述
pub fn describe() {
    metrics::describe_counter!(
        "rule_engine_rules_created_total",
        "Total number of rules compiled and stored"
    );
    metrics::describe_counter!(
        "rule_engine_evaluations_total",
        "Total number of rule set evaluations"
    );
    metrics::describe_counter!(
        "rule_engine_matches_total",
        "Total number of matched rules"
    );
    metrics::describe_counter!(
        "rule_engine_skipped_outputs_total",
        "Total number of matched rules skipped because their output could not be restored"
    );
    metrics::describe_histogram!(
        "rule_engine_evaluation_duration_seconds",
        "Rule set evaluation duration in seconds"
    );
}

#[inline]
pub fn record_rule_created(rule_set_key: &str) {
    metrics::counter!(
        "rule_engine_rules_created_total",
        "rule_set" => rule_set_key.to_string()
    )
    .increment(1);
}

#[inline]
pub fn record_skipped_output(rule_set_key: &str) {
    metrics::counter!(
        "rule_engine_skipped_outputs_total",
        "rule_set" => rule_set_key.to_string()
    )
    .increment(1);
}

/// 记录一次规则集评估
#[inline]
pub fn record_evaluation(rule_set_key: &str, matched: usize, duration_secs: f64) {
    metrics::counter!(
        "rule_engine_evaluations_total",
        "rule_set" => rule_set_key.to_string()
    )
    .increment(1);

    metrics::counter!(
        "rule_engine_matches_total",
        "rule_set" => rule_set_key.to_string()
    )
    .increment(matched as u64);

    metrics::histogram!(
        "rule_engine_evaluation_duration_seconds",
        "rule_set" => rule_set_key.to_string()
    )
    .record(duration_secs);
}
