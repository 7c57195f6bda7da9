//! End-to-end runs against mock inventory and LI platform servers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use iapfeed_cache::CacheStore;
use iapfeed_common::{DeviceGroup, ScopeRecord};
use iapfeed_config::{load_config_from_str, FeedConfig};
use iapfeed_pipeline::{open_cache, read_status, Pipeline, PipelineError, RunOptions, RunState};
use iapfeed_reconcile::{ReconcileError, ScopeSource, StaticScopeSource};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Servers {
    inventory: MockServer,
    platform: MockServer,
}

impl Servers {
    async fn start() -> Self {
        Self {
            inventory: MockServer::start().await,
            platform: MockServer::start().await,
        }
    }
}

fn config(servers: &Servers, root: &Path) -> FeedConfig {
    let text = format!(
        r#"
[inventory]
base_url = "{inventory}/api"
api_token = "secret"
max_concurrency = 2

[cache]
dir = "{root}/cache"

[output]
dir = "{root}/output"

[upload]
base_url = "{platform}"
username = "feeder"
password = "pw"
verification_mode = false

[groups.pe]
inventory_group = 310
"#,
        inventory = servers.inventory.uri(),
        platform = servers.platform.uri(),
        root = root.display(),
    );
    load_config_from_str(&text).unwrap()
}

fn scope_rows() -> Vec<ScopeRecord> {
    vec![
        ScopeRecord {
            network: "84.26.0.0".to_string(),
            netmask: "255.255.255.0".to_string(),
            hostname: "pe-ams-01".to_string(),
            interface: None,
            vlan: Some(100),
            active: true,
        },
        ScopeRecord {
            network: "84.27.0.0".to_string(),
            netmask: "255.255.255.255.0".to_string(),
            hostname: "pe-ams-01".to_string(),
            interface: None,
            vlan: None,
            active: true,
        },
    ]
}

fn pipeline(config: FeedConfig, scopes: Arc<dyn ScopeSource>) -> Pipeline {
    let cache = Arc::new(open_cache(&config));
    Pipeline::new(config, cache, scopes).unwrap()
}

async fn mount_inventory(server: &MockServer, with_foo: bool) {
    let mut devices = vec![json!(
        {"id": 21, "name": "pe-ams-01", "family": "Juniper Junos", "status": "INPRODUCTION"}
    )];
    if with_foo {
        devices.push(json!(
            {"id": 22, "name": "pe-foo-02", "family": "Foo OS", "status": "INPRODUCTION"}
        ));
    }
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(query_param("group", "310"))
        .and(header("X-Netshot-API-Token", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(devices)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/devices/21/interfaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "interfaceName": "lo0.0",
             "ip4Addresses": [{"ip": "10.20.0.1", "prefixLength": 32}]},
            {"id": 2, "interfaceName": "ge-0/0/1",
             "ip4Addresses": [{"ip": "84.25.1.1", "prefixLength": 24}]}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/21"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/21/configs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;

    if with_foo {
        mount_foo(server).await;
    }
}

async fn mount_foo(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/devices/22/interfaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "interfaceName": "Loopback0",
             "ip4Addresses": [{"ip": "10.20.0.2", "prefixLength": 32}]}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/22"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

async fn mount_platform(server: &MockServer, login_status: u16, import_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/1/accounts/actions/login/"))
        .respond_with(
            ResponseTemplate::new(login_status).insert_header("set-cookie", "csrftoken=tok; Path=/"),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/1/iaps/actions/import_xml/"))
        .and(header("X-CSRFToken", "tok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(import_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_run_uploads_and_records_rejections() {
    let servers = Servers::start().await;
    mount_inventory(&servers.inventory, true).await;
    mount_platform(&servers.platform, 200, 1).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&servers, dir.path());
    let output_dir = config.output.dir.clone();
    let pipeline = pipeline(config, Arc::new(StaticScopeSource::new(scope_rows())));

    let run = pipeline
        .run_group(DeviceGroup::Pe, RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state, RunState::Completed, "{:?}", run.error);
    assert!(run.uploaded);
    assert_eq!(run.device_count, 1);
    assert_eq!(run.scope_rows_skipped, 1);
    assert_eq!(run.device_failures.len(), 1);
    assert_eq!(run.device_failures[0].device, "PE-FOO-02");
    assert_eq!(run.device_failures[0].stage, RunState::Building);
    assert!(run.device_failures[0].reason.contains("foo-os"));

    let xml = std::fs::read_to_string(run.output_path.as_ref().unwrap()).unwrap();
    assert!(xml.contains("<name>PE-AMS-01</name>"));
    assert!(xml.contains("<address>84.25.1.0/24</address>"));
    assert!(xml.contains("<address>84.26.0.0/24</address>"));
    assert!(!xml.contains("PE-FOO-02"));
    assert!(run.compressed_path.as_ref().unwrap().exists());

    let status = read_status(&output_dir, DeviceGroup::Pe).unwrap().unwrap();
    assert_eq!(status, run);
    assert!(!pipeline.locks().is_running(DeviceGroup::Pe));
}

#[tokio::test]
async fn login_failure_keeps_artifacts() {
    let servers = Servers::start().await;
    mount_inventory(&servers.inventory, false).await;
    mount_platform(&servers.platform, 401, 0).await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(
        config(&servers, dir.path()),
        Arc::new(StaticScopeSource::default()),
    );

    let run = pipeline
        .run_group(DeviceGroup::Pe, RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state, RunState::Failed);
    let failure = run.error.as_ref().unwrap();
    assert_eq!(failure.stage, RunState::Uploading);
    assert!(failure.cause.contains("401"));
    assert_eq!(run.device_count, 1);
    assert!(run.output_path.as_ref().unwrap().exists());
    assert!(run.compressed_path.as_ref().unwrap().exists());
    assert!(!run.uploaded);
}

#[tokio::test]
async fn no_upload_completes_without_login() {
    let servers = Servers::start().await;
    mount_inventory(&servers.inventory, false).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&servers.platform)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(
        config(&servers, dir.path()),
        Arc::new(StaticScopeSource::default()),
    );

    let options = RunOptions {
        no_upload: true,
        ..RunOptions::default()
    };
    let run = pipeline
        .run_group(DeviceGroup::Pe, options, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.state, RunState::Completed);
    assert!(!run.uploaded);
    assert!(run.compressed_path.is_some());
}

#[tokio::test]
async fn auth_failure_fails_at_fetching() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&servers.inventory)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(
        config(&servers, dir.path()),
        Arc::new(StaticScopeSource::default()),
    );

    let run = pipeline
        .run_group(DeviceGroup::Pe, RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.state, RunState::Failed);
    assert_eq!(run.error.unwrap().stage, RunState::Fetching);
    assert!(run.output_path.is_none());
}

#[tokio::test]
async fn only_rejected_devices_fail_at_building() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 22, "name": "pe-foo-02", "family": "Foo OS", "status": "INPRODUCTION"}
        ])))
        .mount(&servers.inventory)
        .await;
    mount_foo(&servers.inventory).await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(
        config(&servers, dir.path()),
        Arc::new(StaticScopeSource::default()),
    );

    let run = pipeline
        .run_group(DeviceGroup::Pe, RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.state, RunState::Failed);
    let failure = run.error.unwrap();
    assert_eq!(failure.stage, RunState::Building);
    assert_eq!(failure.cause, "no device could be serialized");
}

struct BrokenScopes;

#[async_trait]
impl ScopeSource for BrokenScopes {
    async fn load_scopes(&self) -> Result<Vec<ScopeRecord>, ReconcileError> {
        Err(ReconcileError::Config {
            reason: "scope database unreachable".to_string(),
        })
    }

    fn describe(&self) -> String {
        "broken".to_string()
    }
}

#[tokio::test]
async fn scope_failure_fails_at_reconciling() {
    let servers = Servers::start().await;
    mount_inventory(&servers.inventory, false).await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(config(&servers, dir.path()), Arc::new(BrokenScopes));

    let run = pipeline
        .run_group(DeviceGroup::Pe, RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    let failure = run.error.unwrap();
    assert_eq!(failure.stage, RunState::Reconciling);
    assert!(failure.cause.contains("unreachable"));
}

#[tokio::test]
async fn missing_validator_fails_at_validating() {
    let servers = Servers::start().await;
    mount_inventory(&servers.inventory, false).await;
    let dir = tempfile::tempdir().unwrap();
    let schema = dir.path().join("iaps.xsd");
    std::fs::write(&schema, "<xs:schema/>").unwrap();
    let mut config = config(&servers, dir.path());
    config.output.schema = Some(schema);
    config.output.xmllint = "no-such-xmllint-binary".to_string();
    let pipeline = pipeline(config, Arc::new(StaticScopeSource::default()));

    let run = pipeline
        .run_group(DeviceGroup::Pe, RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.error.as_ref().unwrap().stage, RunState::Validating);
    assert!(run.output_path.as_ref().unwrap().exists());
    assert!(run.compressed_path.is_none());
}

#[tokio::test]
async fn cancelled_before_start() {
    let servers = Servers::start().await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(
        config(&servers, dir.path()),
        Arc::new(StaticScopeSource::default()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let run = pipeline
        .run_group(DeviceGroup::Pe, RunOptions::default(), &cancel)
        .await
        .unwrap();
    let failure = run.error.unwrap();
    assert_eq!(failure.stage, RunState::Starting);
    assert_eq!(failure.cause, "run cancelled");
}

#[tokio::test]
async fn overlapping_run_is_refused() {
    let servers = Servers::start().await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(
        config(&servers, dir.path()),
        Arc::new(StaticScopeSource::default()),
    );
    let _held = pipeline.locks().acquire(DeviceGroup::Pe).unwrap();

    let err = pipeline
        .run_group(DeviceGroup::Pe, RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::AlreadyRunning { group: DeviceGroup::Pe }));
}

#[tokio::test]
async fn warm_populates_the_cache() {
    let servers = Servers::start().await;
    mount_inventory(&servers.inventory, true).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&servers, dir.path());
    let cache_dir = config.cache.dir.clone();
    let pipeline = pipeline(config, Arc::new(StaticScopeSource::default()));

    let fetched = pipeline
        .warm(DeviceGroup::Pe, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(fetched.devices.len(), 2);

    let stats = CacheStore::open(&cache_dir, std::time::Duration::from_secs(60))
        .stats()
        .unwrap();
    assert!(stats.live > 0);
}
