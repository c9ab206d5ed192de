//! 临床就诊记录及其 CPT 编码输出

use crate::shape::{FactShape, FieldDescriptor, FieldValue, IntWidth, Record};
use serde::{Deserialize, Serialize};

/// 就诊事实
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Encounter {
    #[serde(alias = "note_type")]
    pub note_type: String,
    #[serde(alias = "encounter_duration")]
    pub encounter_duration: i32,
    #[serde(alias = "provider_credentials")]
    pub provider_credentials: String,
}

impl Encounter {
    pub fn new(
        note_type: impl Into<String>,
        encounter_duration: i32,
        provider_credentials: impl Into<String>,
    ) -> Self {
        Self {
            note_type: note_type.into(),
            encounter_duration,
            provider_credentials: provider_credentials.into(),
        }
    }
}

impl Record for Encounter {
    fn field_value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "NoteType" => FieldValue::from(&self.note_type),
            "EncounterDuration" => FieldValue::from(self.encounter_duration),
            "ProviderCredentials" => FieldValue::from(&self.provider_credentials),
            _ => FieldValue::Null,
        }
    }
}

impl FactShape for Encounter {
    const SHAPE_NAME: &'static str = "Encounter";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::string("NoteType"),
            FieldDescriptor::integer("EncounterDuration", IntWidth::I32),
            FieldDescriptor::string("ProviderCredentials"),
        ]
    }
}

/// 命中规则给出的 CPT 编码列表，JSON 形式为字符串数组
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CptCodeOutput {
    codes: Vec<String>,
}

impl CptCodeOutput {
    pub fn new(codes: Vec<String>) -> Self {
        Self { codes }
    }

    /// 解析逗号分隔的编码，忽略空白项
    pub fn parse(codes: &str) -> Self {
        Self::new(
            codes
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ConditionCompiler;
    use crate::error::CompilationError;

    #[test]
    fn test_deserialize_camel_and_snake_case() {
        let camel: Encounter = serde_json::from_str(
            r#"{"noteType": "Intake Note", "encounterDuration": 60, "providerCredentials": "MD"}"#,
        )
        .unwrap();
        let snake: Encounter = serde_json::from_str(
            r#"{"note_type": "Intake Note", "encounter_duration": 60, "provider_credentials": "MD"}"#,
        )
        .unwrap();

        assert_eq!(camel, snake);
        assert_eq!(camel, Encounter::new("Intake Note", 60, "MD"));
    }

    #[test]
    fn test_intake_condition() {
        let predicate = ConditionCompiler::new()
            .compile::<Encounter>(
                "(noteType = 'Intake Note' and providerCredentials in ('MD','PSYC','DO') \
                 and encounterDuration >= 16 and encounterDuration <= 90)",
            )
            .unwrap();

        assert!(predicate.matches(&Encounter::new("Intake Note", 60, "MD")));
        assert!(!predicate.matches(&Encounter::new("Intake Note", 60, "LCSW")));
        assert!(!predicate.matches(&Encounter::new("Intake Note", 91, "DO")));
        assert!(!predicate.matches(&Encounter::new("Progress Note", 60, "MD")));
    }

    #[test]
    fn test_string_fields_reject_null_checks() {
        let compiler = ConditionCompiler::new();

        for condition in ["noteType IS NOT NULL", "providerCredentials is null"] {
            let err = compiler.compile::<Encounter>(condition).unwrap_err();
            assert!(
                matches!(err, CompilationError::NotNullable { .. }),
                "{condition}: {err:?}"
            );
        }

        // 空字符串比较仍可表达“未填写”
        let blank = compiler.compile::<Encounter>("noteType = ''").unwrap();
        assert!(blank.matches(&Encounter::new("", 30, "MD")));
    }

    #[test]
    fn test_cpt_code_output() {
        let output = CptCodeOutput::parse(" 90832, ,90833 ");
        assert_eq!(output.codes(), ["90832", "90833"]);

        assert_eq!(
            serde_json::to_string(&output).unwrap(),
            r#"["90832","90833"]"#
        );
        assert!(CptCodeOutput::parse("").codes().is_empty());
    }
}
