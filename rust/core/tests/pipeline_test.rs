// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bimtable_core::{
    normalize_field, process_data_pipeline, DataPipeline, DiscoveryOptions, Error, ParameterType,
    PipelineOptions, PrimitiveValue, TableRow, UserParameter, WITHOUT_HOST,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;

fn load_fixture(name: &str) -> Value {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let text = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("fixture {} not readable: {}", path.display(), e));
    serde_json::from_str(&text).expect("fixture is valid JSON")
}

fn row<'a>(rows: &'a [TableRow], id: &str) -> &'a TableRow {
    rows.iter()
        .find(|r| r.id == id)
        .unwrap_or_else(|| panic!("row {} missing", id))
}

fn detail_ids(row: &TableRow) -> Vec<&str> {
    row.details.iter().map(|d| d.id.as_str()).collect()
}

#[tokio::test]
async fn fixture_rows_and_host_matching() {
    let out = process_data_pipeline(load_fixture("level_01.json"), &[], &[], false)
        .await
        .unwrap();

    assert_eq!(out.stats.elements, 8);
    assert_eq!(out.stats.parents, 4);
    assert_eq!(out.stats.children, 4);
    assert_eq!(out.stats.matched, 2);
    assert_eq!(out.stats.orphaned, 2);

    let rows = &out.table_data;
    assert_eq!(rows.len(), 5);
    assert_eq!(detail_ids(row(rows, "w-100")), vec!["d-200"]);
    // w-101 and w-102 share mark W-02; the later one takes the match
    assert!(row(rows, "w-101").details.is_empty());
    assert_eq!(detail_ids(row(rows, "w-102")), vec!["d-201"]);

    let bucket = rows.last().unwrap();
    assert_eq!(bucket.mark, WITHOUT_HOST);
    assert_eq!(detail_ids(bucket), vec!["d-202", "f-300"]);
    assert!(bucket.details.iter().all(|d| d.is_child));

    assert_eq!(row(rows, "x-400").category, "Uncategorized");
}

#[tokio::test]
async fn fixture_identity_fields() {
    let out = process_data_pipeline(load_fixture("level_01.json"), &[], &[], false)
        .await
        .unwrap();
    let w100 = row(&out.table_data, "w-100");
    assert_eq!(w100.mark, "W-01");
    assert!(w100.element_type.starts_with("Objects.BuiltElements.Wall"));
    assert_eq!(w100.parameters.get("Width"), Some(&PrimitiveValue::Number(300.0)));
    assert_eq!(
        w100.parameters.get("Fire Rating"),
        Some(&PrimitiveValue::String("EI60".into()))
    );

    // corrupt parameter bucket leaves the other buckets intact
    let w102 = row(&out.table_data, "w-102");
    assert_eq!(w102.parameters.get("Base Offset"), Some(&PrimitiveValue::Number(150.0)));
}

#[tokio::test]
async fn available_headers_merge_fixed_and_discovered() {
    let out = process_data_pipeline(load_fixture("level_01.json"), &[], &[], false)
        .await
        .unwrap();

    for headers in [&out.available_headers.parent, &out.available_headers.child] {
        let mut seen = std::collections::HashSet::new();
        for p in headers.iter() {
            assert!(seen.insert(normalize_field(&p.field)), "duplicate {}", p.field);
        }
    }

    let parent: Vec<_> = out.available_headers.parent.iter().map(|p| p.field.as_str()).collect();
    assert_eq!(&parent[..3], &["mark", "category", "Base Offset"]);

    let child = &out.available_headers.child;
    assert_eq!(
        child.iter().filter(|p| p.field.eq_ignore_ascii_case("host")).count(),
        1
    );
    let exterior = child.iter().find(|p| p.field == "Is Exterior").unwrap();
    assert_eq!(exterior.param_type, ParameterType::Boolean);
    assert_eq!(exterior.frequency, Some(0.25));
    let width = child.iter().find(|p| p.field == "Width").unwrap();
    assert_eq!(width.group.as_deref(), Some("Other"));

    let columns: Vec<_> = out.parameter_columns.child.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(columns, vec!["mark", "category", "host", "type"]);
}

#[tokio::test]
async fn essential_pass_then_full_pass() {
    let tree = load_fixture("level_01.json");
    let fast = process_data_pipeline(tree.clone(), &[], &[], true).await.unwrap();
    assert!(!fast.complete);
    assert!(fast.table_data.iter().all(|r| r.parameters.is_empty()));
    assert_eq!(fast.parameter_columns.parent.len(), 2);
    assert_eq!(fast.stats.matched, 2);

    let full = process_data_pipeline(tree, &[], &[], false).await.unwrap();
    assert!(full.complete);
    assert!(full.available_headers.parent.len() > fast.available_headers.parent.len());
}

#[tokio::test]
async fn malformed_node_fails_the_pass() {
    let tree = json!([{ "id": "1", "category": "Walls" }, "not a node"]);
    let result = process_data_pipeline(tree, &[], &[], false).await;
    assert!(matches!(result, Err(Error::MalformedElement { index: 1, .. })));
}

#[tokio::test]
async fn invalid_discovery_options_fail_the_pass() {
    let pipeline = DataPipeline::new(PipelineOptions {
        discovery: DiscoveryOptions {
            sample_size: 0,
            ..DiscoveryOptions::default()
        },
        ..PipelineOptions::default()
    });
    let result = pipeline.process(json!([]), &[], &[], false).await;
    assert!(matches!(result, Err(Error::InvalidOptions(_))));
}

#[tokio::test]
async fn seeded_passes_agree() {
    let elements: Vec<Value> = (0..400)
        .map(|i| {
            let mut e = json!({
                "id": format!("w{}", i),
                "category": "Walls",
                "mark": format!("W-{}", i),
                "Width": 100 + i
            });
            if i % 3 == 0 {
                e["Comments"] = json!("checked");
            }
            e
        })
        .collect();
    let pipeline = DataPipeline::new(PipelineOptions {
        discovery: DiscoveryOptions {
            sample_size: 40,
            ..DiscoveryOptions::default()
        },
        ..PipelineOptions::default()
    });

    let a = pipeline
        .process_with_rng(Value::Array(elements.clone()), &[], &[], &mut StdRng::seed_from_u64(11))
        .await
        .unwrap();
    let b = pipeline
        .process_with_rng(Value::Array(elements), &[], &[], &mut StdRng::seed_from_u64(11))
        .await
        .unwrap();
    assert_eq!(a.available_headers, b.available_headers);
    assert_eq!(a.available_headers.parent[2].field, "Width");
}

#[tokio::test]
async fn user_parameters_flow_into_rows_and_headers() {
    let pipeline = DataPipeline::new(PipelineOptions {
        user_parameters: vec![
            UserParameter::fixed("Phase", "New Construction"),
            UserParameter::equation("Area", "[Unconnected Height] * Width / 1000000"),
        ],
        ..PipelineOptions::default()
    });
    let out = pipeline
        .process(load_fixture("level_01.json"), &[], &[], false)
        .await
        .unwrap();

    let w101 = row(&out.table_data, "w-101");
    let area = w101.parameters.get("Area").and_then(PrimitiveValue::as_f64).unwrap();
    assert!((area - 0.336).abs() < 1e-9);
    // w-102 has no height, so the equation leaves the field absent
    assert!(!row(&out.table_data, "w-102").parameters.contains_key("Area"));
    assert_eq!(
        row(&out.table_data, "w-102").parameters.get("Phase"),
        Some(&PrimitiveValue::String("New Construction".into()))
    );

    let area_header = out
        .available_headers
        .parent
        .iter()
        .find(|p| p.field == "Area")
        .unwrap();
    assert!(area_header.frequency.is_none());
}
