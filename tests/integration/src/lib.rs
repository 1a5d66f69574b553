//! Integration tests for the DynaRest server.
//!
//! Every test starts its own server in-process on an ephemeral port, backed
//! by a fresh in-memory store, and talks to it over HTTP with `reqwest`.
//!
//! ```text
//! cargo test -p dynarest-integration
//! ```

use std::sync::{Arc, Once};

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use dynarest_core::config::ResourceConfig;
use dynarest_core::fields::{FieldSpec, RelatedField};
use dynarest_core::handler::DynaRestHandler;
use dynarest_core::registry::ResourceRegistry;
use dynarest_http::server::serve;
use dynarest_http::service::{RestHttpConfig, RestHttpService};
use dynarest_model::{
    AttributeDefinition, KeySchemaElement, LocalSecondaryIndex, Projection, ProjectionType,
    ScalarType, TableDefinition,
};
use dynarest_storage::{MemoryStore, Table};

static INIT: Once = Once::new();

/// Base path every resource is mounted under.
pub const BASE_PATH: &str = "/api/v1";

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A running server. Shuts down when dropped.
#[derive(Debug)]
pub struct TestServer {
    origin: String,
    client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Absolute URL of a path such as `/api/v1/users/`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.origin)
    }

    /// HTTP client for this server.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET a path and return the status and decoded JSON body.
    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {path} failed: {e}"));
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// POST a JSON body to a path and return the response.
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap_or_else(|e| panic!("POST {path} failed: {e}"))
    }

    /// Follow `meta.next` links from `path`, returning every page.
    pub async fn collect_pages(&self, path: &str) -> Vec<Value> {
        let mut pages = Vec::new();
        let mut next = Some(path.to_owned());
        while let Some(path) = next {
            let (status, page) = self.get_json(&path).await;
            assert_eq!(status, reqwest::StatusCode::OK, "GET {path}: {page}");
            next = page["meta"]["next"].as_str().map(str::to_owned);
            pages.push(page);
            assert!(pages.len() < 100, "pagination does not terminate");
        }
        pages
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn table_definitions() -> Vec<TableDefinition> {
    vec![
        TableDefinition {
            table_name: "users".to_owned(),
            key_schema: vec![KeySchemaElement::hash("id")],
            attribute_definitions: vec![AttributeDefinition::new("id", ScalarType::String)],
            local_secondary_indexes: vec![],
        },
        TableDefinition {
            table_name: "events".to_owned(),
            key_schema: vec![KeySchemaElement::hash("userId"), KeySchemaElement::range("ts")],
            attribute_definitions: vec![
                AttributeDefinition::new("userId", ScalarType::String),
                AttributeDefinition::new("ts", ScalarType::Numeric),
                AttributeDefinition::new("category", ScalarType::String),
            ],
            local_secondary_indexes: vec![LocalSecondaryIndex {
                index_name: "category-index".to_owned(),
                key_schema: vec![
                    KeySchemaElement::hash("userId"),
                    KeySchemaElement::range("category"),
                ],
                projection: Projection {
                    projection_type: ProjectionType::KeysOnly,
                },
            }],
        },
    ]
}

/// Register the test resources:
///
/// - `users`: hash-only, schema-less
/// - `events`: hash/range with a keys-only index on `category`, declared
///   fields and a link to the owning user
fn build_registry(store: &MemoryStore) -> ResourceRegistry {
    for definition in table_definitions() {
        store.create_table(definition).unwrap();
    }
    let table = |name: &str| -> Arc<dyn Table> { store.require_table(name).unwrap() };

    let registry = ResourceRegistry::new(BASE_PATH);
    registry
        .register(
            ResourceConfig::builder()
                .resource_name("users")
                .table(table("users"))
                .build(),
        )
        .unwrap();
    registry
        .register(
            ResourceConfig::builder()
                .resource_name("events")
                .table(table("events"))
                .fields(vec![
                    FieldSpec::string("category"),
                    FieldSpec::string("title"),
                    FieldSpec::boolean("done").with_default(false),
                ])
                .related(vec![RelatedField {
                    name: "user".to_owned(),
                    resource: "users".to_owned(),
                    hash_attribute: "userId".to_owned(),
                    range_attribute: None,
                }])
                .build_primary_keys(true)
                .default_limit(20)
                .max_limit(100)
                .build(),
        )
        .unwrap();
    registry
}

/// Start a server with the test resources on an ephemeral port.
pub async fn start_server() -> TestServer {
    init_tracing();

    let store = MemoryStore::new();
    let handler = DynaRestHandler::new(Arc::new(build_registry(&store)));
    let service = RestHttpService::new(
        Arc::new(handler),
        RestHttpConfig {
            base_path: BASE_PATH.to_owned(),
        },
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(serve(listener, service, async move {
        let _ = rx.await;
    }));

    TestServer {
        origin: format!("http://{addr}"),
        client: reqwest::Client::new(),
        shutdown: Some(tx),
    }
}

/// Category of the seeded event at `ts`.
#[must_use]
pub fn category_of(ts: i64) -> &'static str {
    if (ts / 10) % 2 == 0 { "sports" } else { "news" }
}

/// Create events for `alice` and `bob` at `ts = 100, 110, ..., 250`.
pub async fn seed_events(server: &TestServer) {
    for user in ["alice", "bob"] {
        for ts in (100..=250).step_by(10) {
            let body = json!({
                "userId": user,
                "ts": ts,
                "category": category_of(ts),
                "title": format!("{user}-{ts}"),
            });
            let response = server.post_json("/api/v1/events/", &body).await;
            assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        }
    }
}

/// Range key values of the objects on a list page.
#[must_use]
pub fn range_values(page: &Value) -> Vec<i64> {
    page["objects"]
        .as_array()
        .map(|objects| objects.iter().filter_map(|o| o["ts"].as_i64()).collect())
        .unwrap_or_default()
}

mod test_crud;
mod test_error;
mod test_health;
mod test_hybrid;
mod test_list;
