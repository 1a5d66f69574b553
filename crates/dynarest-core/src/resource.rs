//! A REST resource backed by one table.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use percent_encoding::{
    AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode_byte, utf8_percent_encode,
};
use serde_json::{Map, Value, json};
use tracing::debug;

use dynarest_http::RestResponseBody;
use dynarest_http::response::{empty_response, json_response, with_location};
use dynarest_http::{RestRequest, RestRoute};
use dynarest_model::{AttributeValue, Item, ScalarType, TableKeySchema};
use dynarest_storage::{Condition, PrimaryKey, ScanRequest, StorageError, Table};

use crate::config::ResourceConfig;
use crate::cursor::next_uri;
use crate::error::AdapterError;
use crate::fields::{FieldSet, Hydration, RelatedField};
use crate::filter::{FilterBuilder, PathKeys};
use crate::planner::plan;
use crate::reconciler::{ReadOptions, execute, row_key};
use crate::schema::{coerce_key_text, resolve_key_schema};

/// Characters escaped inside key segments of a URI.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Delimiters that would clash with query string or escape syntax.
const FORBIDDEN_DELIMITERS: [char; 4] = [';', '&', '?', '%'];

/// Joins and splits the hash and range segments of a detail path.
///
/// Every character of the delimiter is escaped inside segments, so a
/// delimiter never appears in an encoded key value.
#[derive(Debug, Clone)]
struct KeyPath {
    delimiter: String,
}

impl KeyPath {
    fn new(delimiter: String) -> Self {
        Self { delimiter }
    }

    fn render(
        &self,
        list_uri: &str,
        hash: &AttributeValue,
        range: Option<&AttributeValue>,
    ) -> String {
        let mut uri = format!("{list_uri}{}", self.encode(hash));
        if let Some(range) = range {
            uri.push_str(&self.delimiter);
            uri.push_str(&self.encode(range));
        }
        uri.push('/');
        uri
    }

    /// Split a raw hash/range key, `None` for the range when the delimiter
    /// is missing or a side is empty.
    fn split(&self, raw_key: &str) -> Result<(String, Option<String>), AdapterError> {
        match raw_key.rsplit_once(self.delimiter.as_str()) {
            Some((hash, range)) if !hash.is_empty() && !range.is_empty() => {
                Ok((decode_segment(hash)?, Some(decode_segment(range)?)))
            }
            _ => Ok((decode_segment(raw_key)?, None)),
        }
    }

    fn encode(&self, value: &AttributeValue) -> String {
        let text = value.to_string();
        let mut encoded = String::with_capacity(text.len());
        // Unescaped chunks hold only ASCII characters left alone by KEY_SEGMENT.
        for chunk in utf8_percent_encode(&text, KEY_SEGMENT) {
            if chunk.starts_with('%') {
                encoded.push_str(chunk);
                continue;
            }
            for c in chunk.chars() {
                match u8::try_from(c) {
                    Ok(b) if self.delimiter.contains(c) => encoded.push_str(percent_encode_byte(b)),
                    _ => encoded.push(c),
                }
            }
        }
        encoded
    }
}

/// Outcome of a merge update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// An existing object was updated.
    Updated,
    /// No object existed; it was created from the body.
    Created(Item),
}

/// A related field resolved against its target resource.
#[derive(Debug, Clone)]
pub struct RelatedLink {
    field: RelatedField,
    list_uri: String,
    key_path: KeyPath,
}

impl RelatedLink {
    /// Resolve `field` against the resource it points at.
    pub fn resolve(field: RelatedField, target: &DynamoResource) -> Result<Self, AdapterError> {
        if field.range_attribute.is_some() != target.schema.range_key.is_some() {
            return Err(AdapterError::validation(format!(
                "related field '{}' does not match the key of resource '{}'",
                field.name, target.name
            )));
        }
        Ok(Self {
            field,
            list_uri: target.list_uri.clone(),
            key_path: target.key_path.clone(),
        })
    }

    fn render(&self, item: &Item) -> Value {
        let value = |attr: &str| item.get(attr).filter(|v| !v.is_null());
        let Some(hash) = value(&self.field.hash_attribute) else {
            return Value::Null;
        };
        let range = match &self.field.range_attribute {
            Some(range_attr) => match value(range_attr) {
                Some(range) => Some(range),
                None => return Value::Null,
            },
            None => None,
        };
        Value::String(self.key_path.render(&self.list_uri, hash, range))
    }
}

/// CRUD and list operations of one table exposed over REST.
#[derive(Debug)]
pub struct DynamoResource {
    name: String,
    table: Arc<dyn Table>,
    schema: TableKeySchema,
    fields: FieldSet,
    field_types: HashMap<String, ScalarType>,
    links: Vec<RelatedLink>,
    options: ReadOptions,
    key_path: KeyPath,
    always_return_data: bool,
    collection_name: String,
    default_limit: usize,
    max_limit: usize,
    list_uri: String,
}

impl DynamoResource {
    /// Build a resource mounted under `base_path` (e.g. `/api/v1`).
    ///
    /// Resources with related fields must be built through
    /// [`ResourceRegistry`](crate::registry::ResourceRegistry), which resolves
    /// the link targets.
    pub fn new(config: ResourceConfig, base_path: &str) -> Result<Self, AdapterError> {
        if !config.related.is_empty() {
            return Err(AdapterError::validation(format!(
                "resource '{}' has related fields and must be registered",
                config.resource_name
            )));
        }
        Self::with_links(config, base_path, Vec::new())
    }

    pub(crate) fn with_links(
        config: ResourceConfig,
        base_path: &str,
        links: Vec<RelatedLink>,
    ) -> Result<Self, AdapterError> {
        let name = config.resource_name;
        if name.is_empty() || name.contains('/') {
            return Err(AdapterError::validation(format!(
                "invalid resource name '{name}'"
            )));
        }
        let delimiter = config.primary_key_delimiter;
        if delimiter.is_empty() || delimiter.contains(FORBIDDEN_DELIMITERS) {
            return Err(AdapterError::validation(format!(
                "primary key delimiter '{delimiter}' of resource '{name}' is not allowed"
            )));
        }

        let schema = resolve_key_schema(config.table.describe())?;
        let fields = FieldSet::new(config.fields, &schema, config.build_primary_keys);
        let field_types = fields.scalar_types();
        let max_limit = config.max_limit.max(1);
        let list_uri = format!("{}/{name}/", base_path.trim_end_matches('/'));

        debug!(resource = %name, table = %config.table.describe().table_name, "resource ready");

        Ok(Self {
            name,
            table: config.table,
            schema,
            fields,
            field_types,
            links,
            options: ReadOptions {
                scan_index_forward: config.scan_index_forward,
                consistent_read: config.consistent_read,
            },
            key_path: KeyPath::new(delimiter),
            always_return_data: config.always_return_data,
            collection_name: config.collection_name,
            default_limit: config.default_limit.clamp(1, max_limit),
            max_limit,
            list_uri,
        })
    }

    /// Resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved key schema of the table.
    #[must_use]
    pub fn schema(&self) -> &TableKeySchema {
        &self.schema
    }

    /// URI of the list endpoint, with a trailing slash.
    #[must_use]
    pub fn list_uri(&self) -> &str {
        &self.list_uri
    }

    /// Detail URI of an item, `None` when it lacks a key attribute.
    #[must_use]
    pub fn resource_uri(&self, item: &Item) -> Option<String> {
        let key = row_key(&self.schema, item)?;
        Some(self.detail_uri(&key))
    }

    fn detail_uri(&self, key: &PrimaryKey) -> String {
        self.key_path.render(&self.list_uri, &key.hash_key, key.range_key.as_ref())
    }

    /// Build the typed primary key from decoded key text.
    pub fn primary_key(&self, hash: &str, range: Option<&str>) -> Result<PrimaryKey, AdapterError> {
        let hash_key = coerce_key_text(&self.schema.hash_key, hash)?;
        match (&self.schema.range_key, range) {
            (None, None) => Ok(PrimaryKey::hash(hash_key)),
            (Some(key), Some(range)) => Ok(PrimaryKey::hash_range(
                hash_key,
                coerce_key_text(key, range)?,
            )),
            (Some(key), None) => Err(AdapterError::validation(format!(
                "missing range key '{}'",
                key.name
            ))),
            (None, Some(_)) => Err(AdapterError::validation(format!(
                "resource '{}' has no range key",
                self.name
            ))),
        }
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// One page of the list endpoint as a JSON document.
    pub fn get_list(
        &self,
        query: &[(String, String)],
        path: &PathKeys,
    ) -> Result<Value, AdapterError> {
        let descriptor = FilterBuilder::new(&self.schema)
            .with_field_types(&self.field_types)
            .with_limits(self.default_limit, self.max_limit)
            .build(query, path)?;
        let plan = plan(&descriptor, &self.schema);
        debug!(resource = %self.name, plan = plan.kind(), "planned list request");

        let page = execute(
            &plan,
            &descriptor,
            self.table.as_ref(),
            &self.schema,
            self.options,
        )?;
        let next = next_uri(&self.list_uri, &descriptor, page.continuation.as_ref());
        let objects: Vec<Value> = page.items.iter().map(|item| self.full_dehydrate(item)).collect();

        let mut document = Map::new();
        document.insert(
            "meta".to_owned(),
            json!({
                "limit": descriptor.page_limit,
                "next": next,
                "previous": null,
                "total_count": null,
            }),
        );
        document.insert(self.collection_name.clone(), Value::Array(objects));
        Ok(Value::Object(document))
    }

    /// Fetch one object.
    pub fn obj_get(&self, key: &PrimaryKey) -> Result<Item, AdapterError> {
        self.table
            .get_item(key, self.options.consistent_read)?
            .ok_or_else(|| self.not_found(key))
    }

    /// Detail URIs of every object whose attributes equal `filters`.
    pub fn get_uri_list(
        &self,
        filters: &[(String, AttributeValue)],
    ) -> Result<Vec<String>, AdapterError> {
        Ok(self
            .scan_keys(filters)?
            .iter()
            .filter_map(|item| self.resource_uri(item))
            .collect())
    }

    /// Number of objects whose attributes equal `filters`.
    pub fn get_count(&self, filters: &[(String, AttributeValue)]) -> Result<usize, AdapterError> {
        Ok(self.scan_keys(filters)?.len())
    }

    fn scan_keys(&self, filters: &[(String, AttributeValue)]) -> Result<Vec<Item>, AdapterError> {
        let request = ScanRequest {
            filters: filters
                .iter()
                .map(|(attr, value)| (attr.clone(), Condition::Eq(value.clone())))
                .collect(),
            limit: None,
            exclusive_start_key: None,
            attributes_to_get: Some(self.schema.key_names().into_iter().map(str::to_owned).collect()),
        };
        Ok(self.table.scan(&request)?.items)
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Create (or replace) the object described by `body`.
    pub fn obj_create(&self, body: &Map<String, Value>) -> Result<Item, AdapterError> {
        self.write(body, None)
    }

    /// Replace the object at `key` with `body`. Keys in the body are ignored.
    pub fn obj_update(
        &self,
        key: &PrimaryKey,
        body: &Map<String, Value>,
    ) -> Result<Item, AdapterError> {
        self.write(body, Some(key))
    }

    /// Merge `body` into the object at `key`, creating it when missing.
    pub fn patch_detail(
        &self,
        key: &PrimaryKey,
        body: &Map<String, Value>,
    ) -> Result<PatchOutcome, AdapterError> {
        let mut item = self.fields.hydrate(body, Hydration::Partial)?;
        self.apply_key(&mut item, key);
        match self.table.put_item(item, false) {
            Ok(()) => {
                debug!(resource = %self.name, "merged object");
                Ok(PatchOutcome::Updated)
            }
            Err(StorageError::ItemNotFound) => {
                debug!(resource = %self.name, "patched object missing, creating it");
                self.write(body, Some(key)).map(PatchOutcome::Created)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the object at `key`.
    pub fn obj_delete(&self, key: &PrimaryKey) -> Result<(), AdapterError> {
        match self.table.delete_item(key)? {
            Some(_) => {
                debug!(resource = %self.name, "deleted object");
                Ok(())
            }
            None => Err(self.not_found(key)),
        }
    }

    /// Bulk delete on the list endpoint. Accepted and ignored.
    pub fn obj_delete_list(&self) -> Result<(), AdapterError> {
        debug!(resource = %self.name, "ignoring list delete");
        Ok(())
    }

    fn write(
        &self,
        body: &Map<String, Value>,
        key: Option<&PrimaryKey>,
    ) -> Result<Item, AdapterError> {
        let mut item = self.fields.hydrate(body, Hydration::Full)?;
        if let Some(key) = key {
            self.apply_key(&mut item, key);
        }
        self.table.put_item(item.clone(), true)?;
        debug!(resource = %self.name, "stored object");
        Ok(item)
    }

    fn apply_key(&self, item: &mut Item, key: &PrimaryKey) {
        item.insert(self.schema.hash_key.name.clone(), key.hash_key.clone());
        if let (Some(name), Some(value)) = (self.schema.range_key_name(), &key.range_key) {
            item.insert(name.to_owned(), value.clone());
        }
    }

    fn not_found(&self, key: &PrimaryKey) -> AdapterError {
        AdapterError::NotFound(format!(
            "no {} object at '{}'",
            self.name,
            self.detail_uri(key)
        ))
    }

    /// Render an item with its related links and `resource_uri`.
    #[must_use]
    pub fn full_dehydrate(&self, item: &Item) -> Value {
        let mut object = self.fields.dehydrate(item);
        for link in &self.links {
            object.insert(link.field.name.clone(), link.render(item));
        }
        object.insert(
            "resource_uri".to_owned(),
            self.resource_uri(item).map_or(Value::Null, Value::String),
        );
        Value::Object(object)
    }

    // ---------------------------------------------------------------------
    // HTTP dispatch
    // ---------------------------------------------------------------------

    /// Serve a routed request.
    pub fn handle(
        &self,
        request: &RestRequest,
    ) -> Result<http::Response<RestResponseBody>, AdapterError> {
        match &request.route {
            RestRoute::List { .. } => self.dispatch_list(request),
            RestRoute::Detail { key, .. } => self.dispatch_detail(request, key),
            RestRoute::Health => Err(AdapterError::NotFound("not a resource route".to_owned())),
        }
    }

    fn dispatch_list(
        &self,
        request: &RestRequest,
    ) -> Result<http::Response<RestResponseBody>, AdapterError> {
        let id = request.request_id.as_str();
        match request.method {
            http::Method::GET => {
                let document = self.get_list(&request.query, &PathKeys::default())?;
                Ok(ok_json(&document, id))
            }
            http::Method::POST => {
                let item = self.obj_create(&parse_body(&request.body)?)?;
                Ok(self.created(&item, id))
            }
            http::Method::DELETE => {
                self.obj_delete_list()?;
                Ok(empty_response(http::StatusCode::NO_CONTENT, id))
            }
            ref other => Err(AdapterError::Unsupported(other.clone())),
        }
    }

    /// Serve a request on a detail path.
    ///
    /// A range segment of `*` or ending in `*`, or a missing range segment
    /// on a hash/range table, turns a GET into a list request scoped to the
    /// hash key.
    fn dispatch_detail(
        &self,
        request: &RestRequest,
        raw_key: &str,
    ) -> Result<http::Response<RestResponseBody>, AdapterError> {
        let id = request.request_id.as_str();
        let (hash, range) = self.split_key(raw_key)?;

        let wildcard = self.schema.range_key.is_some()
            && range.as_deref().is_none_or(|r| r.ends_with('*'));
        if wildcard {
            if request.method != http::Method::GET {
                return Err(AdapterError::Unsupported(request.method.clone()));
            }
            let path = PathKeys {
                hash: Some(hash),
                range,
            };
            let document = self.get_list(&request.query, &path)?;
            return Ok(ok_json(&document, id));
        }

        let key = self.primary_key(&hash, range.as_deref())?;
        match request.method {
            http::Method::GET => {
                check_format(&request.query)?;
                let item = self.obj_get(&key)?;
                Ok(ok_json(&self.full_dehydrate(&item), id))
            }
            http::Method::PUT => {
                let item = self.obj_update(&key, &parse_body(&request.body)?)?;
                Ok(self.updated(&item, id))
            }
            http::Method::PATCH => match self.patch_detail(&key, &parse_body(&request.body)?)? {
                PatchOutcome::Created(item) => Ok(self.created(&item, id)),
                PatchOutcome::Updated => {
                    if self.always_return_data {
                        let item = self.obj_get(&key)?;
                        Ok(ok_json(&self.full_dehydrate(&item), id))
                    } else {
                        Ok(empty_response(http::StatusCode::NO_CONTENT, id))
                    }
                }
            },
            http::Method::DELETE => {
                self.obj_delete(&key)?;
                Ok(empty_response(http::StatusCode::NO_CONTENT, id))
            }
            ref other => Err(AdapterError::Unsupported(other.clone())),
        }
    }

    /// Split and decode the key part of a detail path.
    fn split_key(&self, raw_key: &str) -> Result<(String, Option<String>), AdapterError> {
        if self.schema.range_key.is_none() {
            return Ok((decode_segment(raw_key)?, None));
        }
        self.key_path.split(raw_key)
    }

    fn created(&self, item: &Item, request_id: &str) -> http::Response<RestResponseBody> {
        let response = if self.always_return_data {
            json_response(
                http::StatusCode::CREATED,
                self.full_dehydrate(item).to_string().into_bytes(),
                request_id,
            )
        } else {
            empty_response(http::StatusCode::CREATED, request_id)
        };
        match self.resource_uri(item) {
            Some(location) => with_location(response, &location),
            None => response,
        }
    }

    fn updated(&self, item: &Item, request_id: &str) -> http::Response<RestResponseBody> {
        if self.always_return_data {
            ok_json(&self.full_dehydrate(item), request_id)
        } else {
            empty_response(http::StatusCode::NO_CONTENT, request_id)
        }
    }
}

fn ok_json(document: &Value, request_id: &str) -> http::Response<RestResponseBody> {
    json_response(
        http::StatusCode::OK,
        document.to_string().into_bytes(),
        request_id,
    )
}

/// Parse a JSON object request body.
fn parse_body(body: &Bytes) -> Result<Map<String, Value>, AdapterError> {
    if body.is_empty() {
        return Err(AdapterError::validation("request body is empty"));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AdapterError::validation("request body must be a JSON object")),
        Err(e) => Err(AdapterError::validation(format!("malformed JSON body: {e}"))),
    }
}

fn check_format(query: &[(String, String)]) -> Result<(), AdapterError> {
    match query
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("format"))
    {
        Some((_, format)) if !format.eq_ignore_ascii_case("json") => Err(
            AdapterError::validation(format!("format '{format}' is not supported")),
        ),
        _ => Ok(()),
    }
}

fn decode_segment(raw: &str) -> Result<String, AdapterError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| AdapterError::validation(format!("key segment '{raw}' is not valid UTF-8")))
}
