//! Tests for TreeService: reading, filtering, depth limits and rendering

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rstest::rstest;
use serde_json::{json, Value};

use catree::application::services::{TreeService, STDIN_PATH};
use catree::application::ApplicationError;
use catree::config::{FilterConfig, Settings};
use catree::domain::TreeError;
use catree::infrastructure::traits::{FileSystem, RealFileSystem};

/// In-memory filesystem with a canned stdin
#[derive(Default)]
struct MockFileSystem {
    files: Mutex<HashMap<PathBuf, String>>,
    stdin: String,
}

impl MockFileSystem {
    fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), content.to_string());
        self
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn read_stdin(&self) -> io::Result<String> {
        Ok(self.stdin.clone())
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn ensure_parent(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

fn compact() -> Settings {
    Settings {
        pretty: false,
        ..Settings::default()
    }
}

fn fixture_service(settings: Settings) -> TreeService {
    TreeService::new(Arc::new(RealFileSystem), settings)
}

fn resource(name: &str) -> PathBuf {
    Path::new("tests/resources").join(name)
}

// ============================================================
// Flat input
// ============================================================

#[test]
fn given_menu_fixture_when_loading_flat_then_drops_soft_deleted_rows() {
    let service = fixture_service(compact());

    let tree = service.load_flat::<i64>(&resource("menu_flat.json")).unwrap();

    // refunds (status 0) is filtered out before construction
    assert_eq!(tree.len(), 5);
    assert!(tree.find(&5).is_none());
    assert_eq!(tree.leaf_ids(), vec![2, 3, 4]);
}

#[test]
fn given_include_deleted_when_loading_flat_then_keeps_soft_deleted_rows() {
    let settings = Settings {
        filter: FilterConfig {
            include_deleted: true,
            ..FilterConfig::default()
        },
        ..compact()
    };
    let service = fixture_service(settings);

    let tree = service.load_flat::<i64>(&resource("menu_flat.json")).unwrap();

    assert_eq!(tree.len(), 6);
    assert!(tree.find(&5).is_some());
}

#[test]
fn given_soft_deleted_parent_when_loading_flat_then_reports_missing_parent() {
    let fs = MockFileSystem::default().with_file(
        "rows.json",
        r#"[{"id":0,"parent_id":0},{"id":1,"parent_id":0,"status":0},{"id":2,"parent_id":1}]"#,
    );
    let service = TreeService::new(Arc::new(fs), compact());

    let err = service.load_flat::<i64>(Path::new("rows.json")).unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Tree(TreeError::MissingParent { ref parent_id, .. }) if parent_id == "1"
    ));
}

#[test]
fn given_missing_parent_fixture_when_loading_flat_then_fails() {
    let service = fixture_service(compact());

    let err = service
        .load_flat::<i64>(&resource("missing_parent.json"))
        .unwrap_err();

    assert_eq!(err.to_string(), "record 2 references missing parent 99");
}

#[test]
fn given_string_id_fixture_when_loading_flat_then_builds_tree() {
    let service = fixture_service(compact());

    let tree = service
        .load_flat::<String>(&resource("category_string_ids.json"))
        .unwrap();

    assert_eq!(tree.depth(), 3);
    assert_eq!(tree.leaf_ids(), vec!["apple".to_string()]);
}

#[rstest]
#[case::not_json("not json")]
#[case::object_instead_of_array(r#"{"id": 0, "parent_id": 0}"#)]
#[case::missing_parent_id(r#"[{"id": 0}]"#)]
#[case::wrong_key_type(r#"[{"id": "a", "parent_id": "b"}]"#)]
fn given_malformed_input_when_parsing_flat_then_parse_error(#[case] text: &str) {
    let service = fixture_service(compact());

    let err = service.parse_flat::<i64>("inline", text).unwrap_err();

    assert!(
        matches!(err, ApplicationError::Parse { ref source_name, .. } if source_name == "inline"),
        "unexpected error: {err}"
    );
}

#[test]
fn given_stdin_path_when_loading_flat_then_reads_stdin() {
    let fs = MockFileSystem {
        stdin: r#"[{"id":0,"parent_id":0},{"id":1,"parent_id":0}]"#.to_string(),
        ..MockFileSystem::default()
    };
    let service = TreeService::new(Arc::new(fs), compact());

    let tree = service.load_flat::<i64>(Path::new(STDIN_PATH)).unwrap();

    assert_eq!(tree.len(), 2);
}

#[test]
fn given_absent_file_when_loading_flat_then_operation_failed_names_path() {
    let service = TreeService::new(Arc::new(MockFileSystem::default()), compact());

    let err = service.load_flat::<i64>(Path::new("absent.json")).unwrap_err();

    assert!(matches!(err, ApplicationError::OperationFailed { .. }));
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn given_depth_limit_when_loading_flat_then_rejects_deeper_tree() {
    let settings = Settings {
        max_depth: Some(2),
        ..compact()
    };
    let service = fixture_service(settings);

    let err = service
        .load_flat::<i64>(&resource("menu_flat.json"))
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::DepthExceeded { limit: 2, depth: 3 }
    ));
}

// ============================================================
// Nested input
// ============================================================

#[test]
fn given_nested_fixture_when_flattening_then_renders_pre_order_records() {
    let service = fixture_service(compact());
    let tree = service
        .load_nested::<i64>(&resource("menu_nested.json"))
        .unwrap();

    let rendered = service.render_flat(&tree).unwrap();

    let records: Vec<Value> = serde_json::from_str(&rendered).unwrap();
    let pairs: Vec<(i64, i64)> = records
        .iter()
        .map(|r| (r["id"].as_i64().unwrap(), r["parent_id"].as_i64().unwrap()))
        .collect();
    assert_eq!(pairs, vec![(0, 0), (1, 0), (2, 1), (3, 1), (4, 0)]);
    assert_eq!(records[1]["icon"], json!("goods.png"));
    assert!(records.iter().all(|r| r.get("children").is_none()));
}

#[rstest]
#[case::within_limit(3, true)]
#[case::over_limit(2, false)]
fn given_depth_limit_when_loading_nested_then_enforces_it(#[case] limit: usize, #[case] ok: bool) {
    let settings = Settings {
        max_depth: Some(limit),
        ..compact()
    };
    let service = fixture_service(settings);

    let result = service.load_nested::<i64>(&resource("menu_nested.json"));

    if ok {
        assert!(result.is_ok());
    } else {
        assert!(matches!(
            result.unwrap_err(),
            ApplicationError::DepthExceeded { limit: 2, depth: 3 }
        ));
    }
}

// ============================================================
// Rendering
// ============================================================

#[test]
fn given_flat_fixture_when_rendering_nested_then_groups_meta() {
    let service = fixture_service(compact());
    let tree = service.load_flat::<i64>(&resource("menu_flat.json")).unwrap();

    let rendered = service.render_nested(&tree).unwrap();

    let value: Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(value["meta"], json!({"icon": null, "title": "Console"}));
    let goods = &value["children"][0];
    assert_eq!(goods["name"], json!("goods"));
    assert_eq!(goods["meta"], json!({"icon": "goods.png", "title": "Goods"}));
    assert!(goods.get("title").is_none());
    assert_eq!(goods["children"].as_array().unwrap().len(), 2);
}

#[test]
fn given_hidden_fields_when_rendering_then_strips_them_from_both_forms() {
    let settings = Settings {
        hide: vec!["status".to_string(), "name".to_string()],
        ..compact()
    };
    let service = fixture_service(settings);
    let tree = service.load_flat::<i64>(&resource("menu_flat.json")).unwrap();

    let nested: Value = serde_json::from_str(&service.render_nested(&tree).unwrap()).unwrap();
    let flat: Vec<Value> = serde_json::from_str(&service.render_flat(&tree).unwrap()).unwrap();

    assert!(nested["children"][0].get("status").is_none());
    assert!(nested["children"][0]["children"][0].get("name").is_none());
    assert!(flat.iter().all(|r| r.get("status").is_none() && r.get("name").is_none()));
    assert!(flat.iter().all(|r| r.get("id").is_some()));
}

#[test]
fn given_default_settings_when_rendering_flat_then_status_column_is_hidden() {
    let service = fixture_service(compact());
    let tree = service.load_flat::<i64>(&resource("menu_flat.json")).unwrap();

    let flat: Vec<Value> = serde_json::from_str(&service.render_flat(&tree).unwrap()).unwrap();

    assert!(flat.iter().all(|r| r.get("status").is_none()));
    assert_eq!(flat[1]["name"], json!("goods"));
}

#[test]
fn given_pretty_setting_when_rendering_then_output_is_indented() {
    let service = fixture_service(Settings::default());
    let tree = service.load_flat::<i64>(&resource("menu_flat.json")).unwrap();

    let rendered = service.render_flat(&tree).unwrap();

    assert!(rendered.contains("\n  "));
}

#[test]
fn given_tree_when_summarizing_then_reports_shape() {
    let service = fixture_service(compact());
    let tree = service.load_flat::<i64>(&resource("menu_flat.json")).unwrap();

    let summary = service.summary(&tree);

    assert_eq!(summary.nodes, 5);
    assert_eq!(summary.depth, 3);
    assert_eq!(summary.leaves, vec![2, 3, 4]);
}
