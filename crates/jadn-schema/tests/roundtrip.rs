//! Property tests: every valid value survives encode → decode in both
//! styles, and a resolved registry can be shared across threads.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::thread;

use jadn_core::Value;
use jadn_schema::{decode, encode, load_str, resolve, validate, Style, TypeRegistry};
use proptest::prelude::*;

fn library() -> &'static TypeRegistry {
    static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/library.jadn");
        let text = std::fs::read_to_string(path).expect("fixture readable");
        resolve(load_str(&text).expect("fixture loads")).expect("fixture resolves")
    })
}

fn author() -> impl Strategy<Value = Value> {
    ("[A-Z][a-z]{1,10}", proptest::option::of(1500i64..2020)).prop_map(|(name, born)| {
        let mut slots = vec![Value::String(name)];
        if let Some(year) = born {
            slots.push(Value::Integer(year));
        }
        Value::Array(slots)
    })
}

fn cover() -> impl Strategy<Value = Value> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..32).prop_map(|b| Value::map([("image", Value::Binary(b))])),
        "https://[a-z]{1,8}\\.example/[a-z]{0,8}".prop_map(|u| Value::map([("url", Value::String(u))])),
    ]
}

fn book() -> impl Strategy<Value = Value> {
    (
        "[A-Za-z ]{1,20}",
        proptest::collection::vec(author(), 1..4),
        prop_oneof![Just("hardcover"), Just("paperback"), Just("ebook")],
        proptest::option::of(0i64..4_000_000_000_000),
        proptest::option::of(proptest::collection::btree_set("[a-z]{1,6}", 0..5)),
        proptest::option::of(cover()),
        proptest::option::of(-1.0e6f64..1.0e6),
    )
        .prop_map(|(title, authors, format, published, tags, cover, rating)| {
            let mut m = BTreeMap::new();
            m.insert("title".to_string(), Value::String(title));
            m.insert("authors".to_string(), Value::Array(authors));
            m.insert("format".to_string(), Value::from(format));
            if let Some(ms) = published {
                m.insert("published".to_string(), Value::Integer(ms));
            }
            if let Some(tags) = tags {
                let tags: BTreeSet<String> = tags;
                m.insert(
                    "tags".to_string(),
                    Value::Array(tags.into_iter().map(Value::String).collect()),
                );
            }
            if let Some(cover) = cover {
                m.insert("cover".to_string(), cover);
            }
            if let Some(rating) = rating {
                m.insert("rating".to_string(), Value::Number(rating));
            }
            Value::Map(m)
        })
}

fn catalog() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map("[0-9]{13}", book(), 0..4).prop_map(Value::Map)
}

proptest! {
    #[test]
    fn generated_books_validate(book in book()) {
        prop_assert!(validate(library(), "Book", &book).is_ok());
    }

    #[test]
    fn verbose_round_trip(doc in catalog()) {
        let reg = library();
        let wire = encode(reg, "Library", &doc, Style::Verbose).unwrap();
        prop_assert_eq!(decode(reg, "Library", &wire, Style::Verbose).unwrap(), doc);
    }

    #[test]
    fn concise_round_trip(doc in catalog()) {
        let reg = library();
        let wire = encode(reg, "Library", &doc, Style::Concise).unwrap();
        prop_assert_eq!(decode(reg, "Library", &wire, Style::Concise).unwrap(), doc);
    }

    #[test]
    fn duplicate_tag_is_rejected(tag in "[a-z]{1,6}", others in proptest::collection::btree_set("[A-Z]{1,6}", 0..4)) {
        let reg = library();
        let mut tags: Vec<Value> = others.into_iter().map(Value::String).collect();
        tags.push(Value::String(tag.clone()));
        prop_assert!(validate(reg, "Tags", &Value::Array(tags.clone())).is_ok());
        tags.insert(0, Value::String(tag));
        prop_assert!(validate(reg, "Tags", &Value::Array(tags)).is_err());
    }
}

#[test]
fn registry_shared_across_threads() {
    let reg = Arc::new(library().clone());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let reg = Arc::clone(&reg);
            thread::spawn(move || {
                let title = format!("Volume {i}");
                let book = Value::map([
                    ("title", Value::String(title)),
                    ("authors", Value::Array(vec![Value::Array(vec![Value::from("Anon")])])),
                    ("format", Value::from("ebook")),
                ]);
                let wire = encode(&reg, "Book", &book, Style::Concise).unwrap();
                decode(&reg, "Book", &wire, Style::Concise).unwrap() == book
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
