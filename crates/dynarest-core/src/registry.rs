//! Registered resources by name.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::config::ResourceConfig;
use crate::error::AdapterError;
use crate::resource::{DynamoResource, RelatedLink};

/// Every resource served under one API base path.
#[derive(Debug)]
pub struct ResourceRegistry {
    base_path: String,
    resources: DashMap<String, Arc<DynamoResource>>,
}

impl ResourceRegistry {
    /// Create an empty registry mounted at `base_path`.
    #[must_use]
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            resources: DashMap::new(),
        }
    }

    /// Base path the resources are mounted under.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Register a resource.
    ///
    /// Related fields must point at resources registered earlier.
    pub fn register(&self, config: ResourceConfig) -> Result<Arc<DynamoResource>, AdapterError> {
        let name = config.resource_name.clone();
        let duplicate = || AdapterError::validation(format!("resource '{name}' is already registered"));
        if self.resources.contains_key(&name) {
            return Err(duplicate());
        }

        let links = config
            .related
            .iter()
            .map(|field| {
                let target = self.get(&field.resource).ok_or_else(|| {
                    AdapterError::validation(format!(
                        "related field '{}' of '{name}' points at unknown resource '{}'",
                        field.name, field.resource
                    ))
                })?;
                RelatedLink::resolve(field.clone(), &target)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let resource = Arc::new(DynamoResource::with_links(config, &self.base_path, links)?);
        match self.resources.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(duplicate()),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(Arc::clone(&resource));
            }
        }
        info!(resource = %name, uri = %resource.list_uri(), "registered resource");
        Ok(resource)
    }

    /// Look up a resource.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<DynamoResource>> {
        self.resources.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Names of every registered resource, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use dynarest_model::{
        AttributeDefinition, AttributeValue, Item, KeySchemaElement, ScalarType, TableDefinition,
    };
    use dynarest_storage::{MemoryTable, Table};
    use serde_json::json;

    use super::*;
    use crate::fields::RelatedField;

    fn table(name: &str, range: bool) -> Arc<dyn Table> {
        let mut key_schema = vec![KeySchemaElement::hash("id")];
        let mut attribute_definitions = vec![AttributeDefinition::new("id", ScalarType::String)];
        if range {
            key_schema.push(KeySchemaElement::range("seq"));
            attribute_definitions.push(AttributeDefinition::new("seq", ScalarType::Numeric));
        }
        Arc::new(
            MemoryTable::new(TableDefinition {
                table_name: name.to_owned(),
                key_schema,
                attribute_definitions,
                local_secondary_indexes: vec![],
            })
            .unwrap(),
        )
    }

    fn config(name: &str, range: bool) -> ResourceConfig {
        ResourceConfig::builder()
            .resource_name(name)
            .table(table(name, range))
            .build()
    }

    fn author_link(range_attribute: Option<&str>) -> RelatedField {
        RelatedField {
            name: "author".to_owned(),
            resource: "users".to_owned(),
            hash_attribute: "authorId".to_owned(),
            range_attribute: range_attribute.map(str::to_owned),
        }
    }

    #[test]
    fn test_should_register_and_list_resources() {
        let registry = ResourceRegistry::new("/api/v1");
        registry.register(config("users", false)).unwrap();
        registry.register(config("events", true)).unwrap();

        assert_eq!(registry.names(), ["events", "users"]);
        assert_eq!(
            registry.get("users").unwrap().list_uri(),
            "/api/v1/users/"
        );
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_should_reject_duplicate_resource() {
        let registry = ResourceRegistry::new("/api/v1");
        registry.register(config("users", false)).unwrap();
        assert!(matches!(
            registry.register(config("users", false)),
            Err(AdapterError::Validation(_))
        ));
    }

    #[test]
    fn test_should_register_concurrent_duplicates_once() {
        let registry = ResourceRegistry::new("/api/v1");
        let registered: Vec<Arc<DynamoResource>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.register(config("users", false))))
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().unwrap().ok())
                .collect()
        });

        assert_eq!(registered.len(), 1);
        assert!(Arc::ptr_eq(&registered[0], &registry.get("users").unwrap()));
    }

    #[test]
    fn test_should_render_related_links() {
        let registry = ResourceRegistry::new("/api/v1");
        registry.register(config("users", false)).unwrap();
        let mut posts = config("posts", false);
        posts.related = vec![author_link(None)];
        let posts = registry.register(posts).unwrap();

        let item: Item = [
            ("id".to_owned(), AttributeValue::from("p1")),
            ("authorId".to_owned(), AttributeValue::from("ann lee")),
        ]
        .into();
        let rendered = posts.full_dehydrate(&item);
        assert_eq!(rendered["author"], json!("/api/v1/users/ann%20lee/"));
        assert_eq!(rendered["resource_uri"], json!("/api/v1/posts/p1/"));

        let orphan: Item = [("id".to_owned(), AttributeValue::from("p2"))].into();
        assert_eq!(posts.full_dehydrate(&orphan)["author"], json!(null));
    }

    #[test]
    fn test_should_reject_unresolvable_related_fields() {
        let registry = ResourceRegistry::new("/api/v1");
        let mut posts = config("posts", false);
        posts.related = vec![author_link(None)];
        assert!(registry.register(posts).is_err());

        registry.register(config("users", false)).unwrap();
        let mut posts = config("posts", false);
        posts.related = vec![author_link(Some("seq"))];
        assert!(matches!(
            registry.register(posts),
            Err(AdapterError::Validation(_))
        ));
        assert!(registry.get("posts").is_none());
    }

    #[test]
    fn test_should_require_registry_for_related_fields() {
        let mut posts = config("posts", false);
        posts.related = vec![author_link(None)];
        assert!(DynamoResource::new(posts, "/api/v1").is_err());
    }
}
