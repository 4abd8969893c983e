//! Integration tests: end-to-end load, resolve, validate and transcode.
//!
//! Covers the documented behavior scenarios plus the library fixture under
//! `tests/fixtures/`, loaded from both its JSON and YAML forms.

use std::path::PathBuf;

use jadn_core::{Location, SchemaError, Value};
use jadn_schema::{
    decode, encode, load, load_str, load_yaml_str, resolve, validate, DecodeError, EncodeError,
    Resolver, Style, TypeRegistry,
};
use serde_json::{json, Value as Json};

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn library() -> TypeRegistry {
    resolve(load_str(&fixture("library.jadn")).expect("fixture loads")).expect("fixture resolves")
}

fn registry(doc: Json) -> TypeRegistry {
    resolve(load(&doc).expect("schema loads")).expect("schema resolves")
}

#[test]
fn person_concise_omits_trailing_optional() {
    let reg = registry(json!({"types": [
        ["Person", "Record", [], "", [
            [1, "name", "String"],
            [2, "id", "Integer"],
            [3, "email", "String", ["[0"]]
        ]]
    ]}));

    let bob = Value::from(json!({"name": "Bob", "id": 3}));
    assert!(validate(&reg, "Person", &bob).is_ok());
    assert_eq!(encode(&reg, "Person", &bob, Style::Concise).unwrap(), json!(["Bob", 3]));

    let bob_mail = Value::from(json!({"name": "Bob", "id": 3, "email": "b@x.com"}));
    assert_eq!(
        encode(&reg, "Person", &bob_mail, Style::Concise).unwrap(),
        json!(["Bob", 3, "b@x.com"])
    );
    assert_eq!(
        decode(&reg, "Person", &json!(["Bob", 3]), Style::Concise).unwrap(),
        bob
    );
}

fn products() -> TypeRegistry {
    registry(json!({"types": [
        ["Item", "Record", [], "", [
            [1, "kind", "ProductKind"],
            [2, "product", "Product", ["&1"]]
        ]],
        ["ProductKind", "Enumerated", ["#Product"], ""],
        ["Product", "Choice", [], "", [
            [1, "furniture", "Furniture"],
            [2, "appliance", "Appliance"],
            [3, "software", "Software"]
        ]],
        ["Furniture", "Record", [], "", [
            [1, "material", "String"],
            [2, "legs", "Integer"]
        ]],
        ["Appliance", "Record", [], "", [[1, "watts", "Integer"]]],
        ["Software", "Record", [], "", [
            [1, "version", "String"],
            [2, "license", "String"]
        ]]
    ]}))
}

#[test]
fn explicit_tag_mismatch_points_at_member() {
    let reg = products();
    let chair = Value::from(json!({
        "kind": "furniture",
        "product": {"material": "oak", "legs": 4}
    }));
    assert!(validate(&reg, "Item", &chair).is_ok());

    let wrong = Value::from(json!({
        "kind": "furniture",
        "product": {"version": "1.2", "license": "MIT"}
    }));
    let err = validate(&reg, "Item", &wrong).unwrap_err();
    let paths: Vec<String> = err.violations().iter().map(|v| v.path_string()).collect();
    assert!(!paths.is_empty());
    for path in &paths {
        assert!(path.starts_with("/product/furniture"), "{path}");
    }
}

#[test]
fn explicit_tag_wire_forms() {
    let reg = products();
    let chair = Value::from(json!({
        "kind": "furniture",
        "product": {"material": "oak", "legs": 4}
    }));
    assert_eq!(
        encode(&reg, "Item", &chair, Style::Verbose).unwrap(),
        json!({"kind": "furniture", "product": {"material": "oak", "legs": 4}})
    );
    assert_eq!(
        encode(&reg, "Item", &chair, Style::Concise).unwrap(),
        json!([1, ["oak", 4]])
    );
    for style in [Style::Verbose, Style::Concise] {
        let wire = encode(&reg, "Item", &chair, style).unwrap();
        assert_eq!(decode(&reg, "Item", &wire, style).unwrap(), chair);
    }
}

#[test]
fn undefined_reference_aborts_build() {
    let doc = json!({"types": [
        ["Order", "Record", [], "", [
            [1, "id", "Integer"],
            [2, "item", "Foo"]
        ]]
    ]});
    let err = resolve(load(&doc).unwrap()).unwrap_err();
    assert_eq!(
        err,
        SchemaError::UnresolvedReference {
            reference: "Foo".into(),
            location: Location::of_field("Order", 2, "item"),
        }
    );
    assert!(err.to_string().contains("Foo"));
}

#[test]
fn derived_items_match_source_fields() {
    let reg = library();
    let book = reg.get("Book").unwrap();
    let derived = reg.get("BookField").unwrap();
    let expected: Vec<(i64, &str)> = book
        .body
        .fields()
        .iter()
        .map(|f| (i64::from(f.id), f.name.as_str()))
        .collect();
    let actual: Vec<(i64, &str)> = derived
        .body
        .items()
        .iter()
        .map(|i| (i.id, i.value.as_str()))
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn set_semantics_reject_duplicates() {
    let reg = library();
    let dup = Value::from(json!(["sf", "classic", "sf"]));
    assert!(validate(&reg, "Tags", &dup).is_err());
    assert!(matches!(
        encode(&reg, "Tags", &dup, Style::Verbose),
        Err(EncodeError::Invalid(_))
    ));
    let unique = Value::from(json!(["sf", "classic"]));
    assert!(validate(&reg, "Tags", &unique).is_ok());
}

#[test]
fn rebuild_is_deterministic() {
    let text = fixture("library.jadn");
    let a = resolve(load_str(&text).unwrap()).unwrap();
    let b = resolve(load_str(&text).unwrap()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.names().collect::<Vec<_>>(), b.names().collect::<Vec<_>>());
}

#[test]
fn exported_root_is_not_reported_unreferenced() {
    let reg = library();
    assert_eq!(reg.unreferenced(), vec!["BookField"]);
}

#[test]
fn yaml_and_json_fixtures_agree() {
    let from_json = library();
    let from_yaml = resolve(load_yaml_str(&fixture("library.yaml")).unwrap()).unwrap();
    assert_eq!(from_json, from_yaml);
}

#[test]
fn library_document_transcodes() {
    let reg = library();
    let verbose = json!({
        "9780441013593": {
            "title": "Dune",
            "authors": [["Frank Herbert", 1920]],
            "format": "paperback",
            "published": "1965-08-01T00:00:00.000Z",
            "tags": ["sf", "classic"],
            "cover": {"url": "https://example.com/dune.jpg"}
        }
    });
    let value = decode(&reg, "Library", &verbose, Style::Verbose).unwrap();
    let concise = encode(&reg, "Library", &value, Style::Concise).unwrap();
    assert_eq!(
        concise,
        json!({
            "9780441013593": [
                "Dune",
                [["Frank Herbert", 1920]],
                2,
                "1965-08-01T00:00:00.000Z",
                ["sf", "classic"],
                [2, "https://example.com/dune.jpg"]
            ]
        })
    );
    assert_eq!(decode(&reg, "Library", &concise, Style::Concise).unwrap(), value);
    assert_eq!(encode(&reg, "Library", &value, Style::Verbose).unwrap(), verbose);
}

#[test]
fn bad_isbn_key_is_reported_at_key() {
    let reg = library();
    let bad = json!({"123": {"title": "x", "authors": [["a"]], "format": "ebook"}});
    let err = decode(&reg, "Library", &bad, Style::Verbose).unwrap_err();
    let DecodeError::Invalid(inner) = err else {
        panic!("expected validation failure, got {err}");
    };
    assert_eq!(inner.violations()[0].path_string(), "/123");
}

#[test]
fn namespace_import_resolves() {
    let base = load(&json!({
        "info": {"package": "http://example.com/base"},
        "types": [["Name", "String", ["{1"]]]
    }))
    .unwrap();
    let app = load(&json!({
        "info": {"package": "http://example.com/app", "namespaces": {"b": "http://example.com/base"}},
        "types": [["User", "Record", [], "", [[1, "name", "b:Name"]]]]
    }))
    .unwrap();
    let reg = Resolver::new(app).import(base).resolve().unwrap();
    assert!(reg.contains("b:Name"));
    assert!(validate(&reg, "User", &Value::from(json!({"name": "ann"}))).is_ok());
    assert!(validate(&reg, "User", &Value::from(json!({"name": ""}))).is_err());
}
