use assert_fs::prelude::*;
use insta::assert_snapshot;
use xml_splice::error::SpliceError;
use xml_splice::transaction::{
    self, DeleteOperation, InsertOperation, Operation, ReplaceOperation, SetValueOperation,
};
use xml_splice::XmlDocument;

const CATALOG: &str = r#"<catalog version="1">
<book id="a"><title>First</title></book>
<book id="b"><title>Second</title></book>
<magazine/>
</catalog>"#;

fn catalog() -> XmlDocument {
    let _ = env_logger::builder().is_test(true).try_init();
    XmlDocument::parse(CATALOG).expect("catalog parses")
}

#[test]
fn apply_yaml_batch() {
    let mut doc = catalog();
    let operations = transaction::from_yaml(
        r#"
- op: delete
  target: /catalog/magazine
  comment: no more magazines
- op: set_value
  target: /catalog/@version
  value: "2"
- op: append_child
  target: /catalog/book[2]
  content: <author>Someone</author>
- op: insert_before
  target: /catalog/book[1]
  content: "<!--books-->"
- op: replace
  target: /catalog/book[1]/title/text()
  content: Premier
"#,
    )
    .unwrap();

    doc.apply(operations).unwrap();
    assert_snapshot!(
        doc.outline(),
        @r#"#document(catalog[@version="2"]("\n", <!--books-->, book[@id="a"](title("Premier")), "\n", book[@id="b"](title("Second"), author("Someone")), "\n", "\n"))"#
    );
}

#[test]
fn apply_json_batch_with_ranges() {
    let mut doc = catalog();
    let operations = transaction::from_json(
        r#"[
            {"op": "replace", "target": "/catalog/book[1]", "until": "/catalog/magazine", "content": "<shelf/>"},
            {"op": "prepend_child", "target": "/catalog/shelf", "content": "<label>Empty</label>"}
        ]"#,
    )
    .unwrap();

    doc.apply(operations).unwrap();
    assert_snapshot!(
        doc.outline(),
        @r#"#document(catalog[@version="1"]("\n", shelf(label("Empty")), magazine, "\n"))"#
    );
}

#[test]
fn failing_batch_leaves_document_untouched() {
    let mut doc = catalog();
    let before = doc.outline();

    let operations = vec![
        Operation::InsertAfter(InsertOperation {
            target: "/catalog/book[2]".parse().unwrap(),
            comment: None,
            content: "<book id='c'/>".to_string(),
        }),
        Operation::Delete(DeleteOperation {
            target: "/catalog/book[4]".parse().unwrap(),
            comment: None,
            until: None,
        }),
    ];

    let err = doc.apply(operations).unwrap_err();
    match err {
        SpliceError::OperationFailed { index, source } => {
            assert_eq!(index, 1);
            assert_eq!(*source, SpliceError::NodeNotFound("/catalog/book[4]".into()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(doc.outline(), before);
}

#[test]
fn invalid_edit_in_batch_reports_its_index() {
    let mut doc = catalog();
    let before = doc.outline();

    let operations = vec![
        Operation::SetValue(SetValueOperation {
            target: "/catalog/book[1]/@id".parse().unwrap(),
            comment: Some("renumber".into()),
            value: "z".into(),
        }),
        Operation::Replace(ReplaceOperation {
            target: "/catalog/book[2]".parse().unwrap(),
            comment: None,
            until: Some("/catalog/book[1]".parse().unwrap()),
            content: String::new(),
        }),
    ];

    let err = doc.apply(operations).unwrap_err();
    assert!(
        matches!(
            &err,
            SpliceError::OperationFailed { index: 1, source } if matches!(**source, SpliceError::InvalidRange(_))
        ),
        "{err:?}"
    );
    assert_eq!(doc.outline(), before);
}

#[test]
fn load_operations_by_extension() {
    let temp = assert_fs::TempDir::new().unwrap();

    let json = temp.child("ops.json");
    json.write_str(r#"[{"op": "delete", "target": "/catalog/magazine"}]"#)
        .unwrap();
    let yaml = temp.child("ops.yml");
    yaml.write_str("- op: delete\n  target: /catalog/magazine\n")
        .unwrap();

    let from_json = transaction::load_operations(json.path()).unwrap();
    let from_yaml = transaction::load_operations(yaml.path()).unwrap();
    assert_eq!(from_json, from_yaml);

    let mut doc = catalog();
    doc.apply(from_json).unwrap();
    assert!(!doc.outline().contains("magazine"));
}

#[test]
fn load_operations_reports_missing_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let missing = temp.child("missing.yaml");
    let err = transaction::load_operations(missing.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to read operations file"));
}

#[test]
fn load_operations_reports_invalid_content() {
    let file = assert_fs::NamedTempFile::new("ops.json").unwrap();
    file.write_str(r#"[{"op": "delete"}]"#).unwrap();
    let err = transaction::load_operations(file.path()).unwrap_err();
    assert!(err.to_string().contains("Invalid operations"));
    assert!(err.downcast_ref::<SpliceError>().is_some());
}
