// SPDX-License-Identifier: Apache-2.0

fn rust_files_under(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|ext| ext.to_str()) == Some("rs") {
                out.push(path);
            }
        }
    }
    out
}

fn assert_no_tokens(layer: &str, forbidden: &[&str]) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join(layer);
    let files = rust_files_under(&root);
    assert!(!files.is_empty(), "no rust files under src/{layer}");
    for path in files {
        let text = std::fs::read_to_string(&path).expect("read source file");
        for token in forbidden {
            assert!(
                !text.contains(token),
                "{layer} file {} contains forbidden token: {}",
                path.display(),
                token
            );
        }
    }
}

#[test]
fn http_layer_does_not_touch_storage_directly() {
    assert_no_tokens("http", &["rusqlite::", "std::fs::", "tokio::fs::", "redis::"]);
}

#[test]
fn middleware_layer_does_not_touch_storage_directly() {
    assert_no_tokens("middleware", &["rusqlite::", "folio_store::", "redis::"]);
}

#[test]
fn services_layer_avoids_http_framework_types() {
    assert_no_tokens("services", &["axum::", "hyper::", "crate::http::"]);
}

#[test]
fn telemetry_layer_does_not_import_http_modules() {
    assert_no_tokens("telemetry", &["crate::http::", "axum::", "folio_store::"]);
}
