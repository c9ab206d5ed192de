//! 实体元数据缓存
//!
//! 每个事实形状只构建一次字段别名表，并在进程生命周期内复用。
//! 别名包括声明名称、小驼峰名称与蛇形名称，查找不区分大小写。

use crate::shape::{FactShape, FieldDescriptor, ShapeRef};
use dashmap::DashMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// 单个形状的元数据
#[derive(Debug)]
pub struct EntityMetadata {
    shape_name: &'static str,
    fields: Vec<FieldDescriptor>,
    /// 小写别名 -> 字段下标
    aliases: HashMap<String, usize>,
}

impl EntityMetadata {
    pub fn build(shape_name: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        let mut aliases = HashMap::with_capacity(fields.len() * 2);

        // 声明名称优先于派生别名
        for (index, field) in fields.iter().enumerate() {
            aliases.insert(field.name().to_lowercase(), index);
        }
        for (index, field) in fields.iter().enumerate() {
            for alias in [lower_camel_case(field.name()), snake_case(field.name())] {
                aliases.entry(alias.to_lowercase()).or_insert(index);
            }
        }

        Self {
            shape_name,
            fields,
            aliases,
        }
    }

    pub fn shape_name(&self) -> &'static str {
        self.shape_name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// 按别名查找字段；未找到返回 `None`，由调用方决定如何报错
    pub fn lookup(&self, alias: &str) -> Option<&FieldDescriptor> {
        self.aliases
            .get(&alias.to_lowercase())
            .map(|&index| &self.fields[index])
    }
}

/// 元数据缓存
///
/// 每个形状对应一个 `OnceLock` 单元：分片锁只在取得单元时短暂持有，
/// 构建在锁外进行，因此不同形状的首次查找互不阻塞，同一形状只构建一次。
#[derive(Debug, Default)]
pub struct EntityMetadataCache {
    entries: DashMap<TypeId, Arc<OnceLock<Arc<EntityMetadata>>>>,
}

impl EntityMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享缓存
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<EntityMetadataCache>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(Self::new())).clone()
    }

    pub fn metadata_for<S: FactShape>(&self) -> Arc<EntityMetadata> {
        self.metadata_for_shape(ShapeRef::of::<S>())
    }

    pub fn metadata_for_shape(&self, shape: ShapeRef) -> Arc<EntityMetadata> {
        let cell = self
            .entries
            .entry(shape.type_id())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .value()
            .clone();

        cell.get_or_init(|| {
            let fields = shape.fields();
            debug!(shape = shape.name(), fields = fields.len(), "构建实体元数据");
            Arc::new(EntityMetadata::build(shape.name(), fields))
        })
        .clone()
    }

    /// 已缓存的形状数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn lower_camel_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev != '_' && (prev.is_lowercase() || prev.is_ascii_digit() || next_is_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{FieldValue, IntWidth, Record};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Patient;

    impl Record for Patient {
        fn field_value(&self, _field: &str) -> FieldValue<'_> {
            FieldValue::Null
        }
    }

    impl FactShape for Patient {
        const SHAPE_NAME: &'static str = "Patient";

        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::string("FirstName"),
                FieldDescriptor::integer("VisitCount", IntWidth::I32),
                FieldDescriptor::string("MRNCode"),
            ]
        }
    }

    struct Other;

    impl Record for Other {
        fn field_value(&self, _field: &str) -> FieldValue<'_> {
            FieldValue::Null
        }
    }

    impl FactShape for Other {
        const SHAPE_NAME: &'static str = "Other";

        fn fields() -> Vec<FieldDescriptor> {
            vec![FieldDescriptor::string("Code")]
        }
    }

    struct Counted;

    impl Record for Counted {
        fn field_value(&self, _field: &str) -> FieldValue<'_> {
            FieldValue::Null
        }
    }

    impl FactShape for Counted {
        const SHAPE_NAME: &'static str = "Counted";

        fn fields() -> Vec<FieldDescriptor> {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            vec![FieldDescriptor::string("Code")]
        }
    }

    #[test]
    fn test_alias_lookup() {
        let metadata = EntityMetadata::build("Patient", Patient::fields());

        assert_eq!(metadata.lookup("FirstName").unwrap().name(), "FirstName");
        assert_eq!(metadata.lookup("firstName").unwrap().name(), "FirstName");
        assert_eq!(metadata.lookup("FIRSTNAME").unwrap().name(), "FirstName");
        assert_eq!(metadata.lookup("first_name").unwrap().name(), "FirstName");
        assert_eq!(metadata.lookup("visit_count").unwrap().name(), "VisitCount");
        assert_eq!(metadata.lookup("mrn_code").unwrap().name(), "MRNCode");
        assert!(metadata.lookup("LastName").is_none());
    }

    #[test]
    fn test_declared_name_wins_collision() {
        let metadata = EntityMetadata::build(
            "Odd",
            vec![
                FieldDescriptor::string("NoteType"),
                FieldDescriptor::integer("note_type", IntWidth::I32),
            ],
        );

        assert_eq!(metadata.lookup("note_type").unwrap().name(), "note_type");
        assert_eq!(metadata.lookup("noteType").unwrap().name(), "NoteType");
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(lower_camel_case("NoteType"), "noteType");
        assert_eq!(lower_camel_case(""), "");
        assert_eq!(snake_case("EncounterDuration"), "encounter_duration");
        assert_eq!(snake_case("HTTPStatus"), "http_status");
        assert_eq!(snake_case("Field2Name"), "field2_name");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_cache_returns_same_metadata() {
        let cache = EntityMetadataCache::new();

        let first = cache.metadata_for::<Other>();
        let second = cache.metadata_for::<Other>();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_lookup_builds_once() {
        let cache = Arc::new(EntityMetadataCache::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.metadata_for::<Counted>())
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
