//! End-to-end tests for compositions: recursive child validation, shape
//! errors, duplicate keys, provenance and the composition entry point.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use schemagate::{
    AnyValue, CancellationToken, CheckFailure, Code, Config, Constraint, ConstraintChecker, Error,
    Outcome, Path, PropertyDef, Provenance, RawInstance, RelationDef, Schema, Span, StandardChecker,
    TypeDef, ValidInstance, ValidationFailure, Validator, ValueRegistry, Value,
};

// ============================================================================
// Fixtures
// ============================================================================

fn schema() -> Schema {
    Schema::new("shop")
        .with_type(
            TypeDef::new("Order")
                .with_property(PropertyDef::required("id", Constraint::integer()))
                .with_primary_key(["id"])
                .with_relation(RelationDef::composition("lines", "Line").required())
                .with_relation(RelationDef::composition("notes", "Note")),
        )
        .with_type(
            TypeDef::new("Line")
                .part()
                .with_property(PropertyDef::required("id", Constraint::integer()))
                .with_property(PropertyDef::required(
                    "qty",
                    Constraint::Integer { min: Some(1), max: None },
                ))
                .with_primary_key(["id"])
                .with_relation(RelationDef::composition("taxes", "Tax")),
        )
        .with_type(
            TypeDef::new("Tax")
                .part()
                .with_property(PropertyDef::required("rate", Constraint::float())),
        )
        .with_type(TypeDef::new("Note").part().with_property(PropertyDef::required("text", Constraint::string())))
}

fn validator() -> Validator {
    Validator::new(Arc::new(schema()), Config::default())
}

fn line(id: i64, qty: i64) -> AnyValue {
    AnyValue::map([("id", id), ("qty", qty)])
}

fn order(lines: AnyValue) -> RawInstance {
    RawInstance::from_pairs([("id", AnyValue::from(1)), ("lines", lines)])
}

fn run(raw: &RawInstance) -> Outcome {
    validator().validate_one(&CancellationToken::new(), "Order", raw).unwrap()
}

fn valid(raw: &RawInstance) -> ValidInstance {
    match run(raw) {
        Outcome::Valid(v) => v,
        Outcome::Invalid(f) => panic!("expected valid instance, got:\n{f}"),
    }
}

fn invalid(raw: &RawInstance) -> ValidationFailure {
    match run(raw) {
        Outcome::Valid(v) => panic!("expected failure, got {v}"),
        Outcome::Invalid(f) => f,
    }
}

fn codes(failure: &ValidationFailure) -> Vec<Code> {
    failure.result.iter().map(|i| i.code).collect()
}

// ============================================================================
// 1. Valid compositions
// ============================================================================

#[test]
fn test_children_are_validated_and_wrapped() {
    let order = valid(&order(AnyValue::list([line(100, 2), line(101, 1)])));

    let lines = order.composed("lines").unwrap().as_slice().unwrap();
    assert_eq!(lines.len(), 2);
    let first = lines.get(0).as_map().unwrap();
    assert_eq!(first.get("qty"), Some(&Value::Int(2)));

    let children = order.children("lines").unwrap();
    let keys: Vec<&str> = children.iter().map(|c| c.primary_key().as_str()).collect();
    assert_eq!(keys, vec!["[100]", "[101]"]);
    assert_eq!(children[1].type_name(), "Line");
    assert_eq!(children[1].provenance().unwrap().path.to_string(), "lines[1]");

    // Optional and absent: no entry at all.
    assert!(order.composed("notes").is_none());
}

#[test]
fn test_optional_empty_composition() {
    let mut raw = order(AnyValue::list([line(1, 1)]));
    raw.properties.insert("notes".into(), AnyValue::list(Vec::<AnyValue>::new()));
    let order = valid(&raw);
    let notes = order.composed("notes").unwrap().as_slice().unwrap();
    assert!(notes.is_empty() && !notes.is_nil());
}

#[test]
fn test_nested_compositions() {
    let taxed = AnyValue::map([
        ("id", AnyValue::from(7)),
        ("qty", AnyValue::from(1)),
        ("taxes", AnyValue::list([AnyValue::map([("rate", 0.2)])])),
    ]);
    let order = valid(&order(AnyValue::list([taxed])));

    let line = &order.children("lines").unwrap()[0];
    let taxes = line.children("taxes").unwrap();
    assert_eq!(taxes[0].property("rate"), Some(&Value::Float(0.2)));
    assert_eq!(taxes[0].provenance().unwrap().path.to_string(), "lines[0].taxes[0]");

    let rendered = order.to_value().to_string();
    assert!(rendered.contains("taxes"), "{rendered}");
}

#[test]
fn test_children_without_key_may_repeat() {
    let mut raw = order(AnyValue::list([line(1, 1)]));
    let note = AnyValue::map([("text", "same")]);
    raw.properties.insert("notes".into(), AnyValue::list([note.clone(), note]));
    assert_eq!(valid(&raw).children("notes").unwrap().len(), 2);
}

// ============================================================================
// 2. Requiredness and shape
// ============================================================================

#[test]
fn test_required_absent_and_empty() {
    let absent = invalid(&RawInstance::from_pairs([("id", 1)]));
    assert_eq!(codes(&absent), vec![Code::UnresolvedRequiredComposition]);
    assert_eq!(absent.result.issues()[0].detail_value("reason"), Some("absent"));

    let empty = invalid(&order(AnyValue::list(Vec::<AnyValue>::new())));
    assert_eq!(codes(&empty), vec![Code::UnresolvedRequiredComposition]);
    assert_eq!(empty.result.issues()[0].detail_value("reason"), Some("empty"));
}

#[test]
fn test_null_and_scalar_are_shape_errors() {
    let mut raw = order(AnyValue::list([line(1, 1)]));
    raw.properties.insert("notes".into(), AnyValue::Null);
    let failure = invalid(&raw);
    assert_eq!(codes(&failure), vec![Code::EdgeShapeMismatch]);
    assert_eq!(failure.result.issues()[0].detail_value("expected"), Some("array"));
    assert_eq!(failure.result.issues()[0].detail_value("got"), Some("null"));

    let failure = invalid(&order(AnyValue::from("lines")));
    assert_eq!(codes(&failure), vec![Code::EdgeShapeMismatch]);
}

#[test]
fn test_bad_elements_do_not_hide_siblings() {
    let failure = invalid(&order(AnyValue::list([line(1, 1), AnyValue::from(42), line(3, 0)])));
    assert_eq!(codes(&failure), vec![Code::EdgeShapeMismatch, Code::ConstraintFail]);

    let shape = &failure.result.issues()[0];
    assert_eq!(shape.path.as_deref(), Some("lines[1]"));
    assert_eq!(shape.detail_value("expected"), Some("object"));

    let child = &failure.result.issues()[1];
    assert_eq!(child.path.as_deref(), Some("lines[2].qty"));
    assert_eq!(child.detail_value("relation"), Some("lines"));
    assert_eq!(child.detail_value("relation_field"), Some("lines"));
    assert_eq!(child.detail_value("json_field"), Some("qty"));
}

#[test]
fn test_composition_target_must_exist() {
    let schema = Schema::new("app").with_type(
        TypeDef::new("Box").with_relation(RelationDef::composition("items", "Missing")),
    );
    let v = Validator::new(Arc::new(schema), Config::default());
    let raw = RawInstance::from_pairs([("items", AnyValue::list(Vec::<AnyValue>::new()))]);
    let failure = v.validate_one(&CancellationToken::new(), "Box", &raw).unwrap().failure().unwrap();
    assert_eq!(codes(&failure), vec![Code::CompositionNotFound]);
}

#[test]
fn test_absent_optional_composition_ignores_missing_target() {
    let schema = Schema::new("app").with_type(
        TypeDef::new("Box")
            .with_property(PropertyDef::required("id", Constraint::integer()))
            .with_primary_key(["id"])
            .with_relation(RelationDef::composition("items", "Missing")),
    );
    let v = Validator::new(Arc::new(schema), Config::default());
    let outcome = v.validate_one(&CancellationToken::new(), "Box", &RawInstance::from_pairs([("id", 1)])).unwrap();
    let boxed = outcome.valid().unwrap();
    assert!(boxed.composed("items").is_none());
}

// ============================================================================
// 3. Duplicate keys
// ============================================================================

#[test]
fn test_duplicate_composed_key() {
    let failure = invalid(&order(AnyValue::list([line(100, 1), line(101, 1), line(100, 2)])));
    assert_eq!(codes(&failure), vec![Code::DuplicateComposedPk]);

    let issue = &failure.result.issues()[0];
    assert!(issue.path.as_deref().unwrap().contains("[id=100]"), "{issue}");
    assert_eq!(issue.detail_value("index"), Some("2"));
    assert_eq!(issue.detail_value("first_index"), Some("0"));
}

#[test]
fn test_duplicate_reported_once() {
    let failure = invalid(&order(AnyValue::list([line(5, 1), line(5, 1), line(5, 1)])));
    assert_eq!(failure.result.with_code(Code::DuplicateComposedPk).count(), 1);
}

// ============================================================================
// 4. Provenance
// ============================================================================

#[test]
fn test_child_issues_carry_parent_provenance() {
    let span = Span::new(3, 5, 9, 6);
    let raw = order(AnyValue::list([line(1, 1), line(2, 0)])).with_provenance(
        Provenance::new("orders.json").with_path(Path::root().field("orders").index(4)).with_span(span),
    );
    let failure = invalid(&raw);
    let issue = &failure.result.issues()[0];
    assert_eq!(issue.path.as_deref(), Some("orders[4].lines[1].qty"));
    assert_eq!(issue.span, Some(span));
    assert_eq!(
        issue.to_string(),
        "error [ConstraintFail] orders[4].lines[1].qty (3:5-9:6): property \"qty\": value 0 is below minimum 1"
    );
}

#[test]
fn test_duplicate_path_under_parent_path() {
    let raw = order(AnyValue::list([line(100, 1), line(100, 1)]))
        .with_provenance(Provenance::default().with_path(Path::root().field("orders").index(0)));
    let failure = invalid(&raw);
    assert_eq!(failure.result.issues()[0].path.as_deref(), Some("orders[0].lines[id=100]"));
}

// ============================================================================
// 5. Composition entry point
// ============================================================================

#[test]
fn test_validate_for_composition_accepts_parts() {
    let v = validator();
    let cancel = CancellationToken::new();
    let raws = vec![RawInstance::from_pairs([("id", 1), ("qty", 3)]), RawInstance::from_pairs([("id", 2)])];

    let direct = v.validate(&cancel, "Line", Some(&raws));
    assert_eq!(direct.failures.as_ref().map(Vec::len), Some(2));
    assert!(direct.failures.unwrap().iter().all(|f| f.result.has_code(Code::PartTypeDirect)));

    let batch = v.validate_for_composition(&cancel, "Order", "lines", Some(&raws));
    assert_eq!(batch.valid.map(|v| v.len()), Some(1));
    let failures = batch.failures.unwrap();
    assert_eq!(failures[0].result.issues()[0].code, Code::MissingRequired);
}

#[test]
fn test_validate_for_composition_unresolved() {
    let v = validator();
    let cancel = CancellationToken::new();
    let raws = vec![RawInstance::default()];

    assert!(v.validate_for_composition(&cancel, "Order", "lines", None).valid.is_none());

    let unknown_parent = v.validate_for_composition(&cancel, "Invoice", "lines", Some(&raws));
    assert!(unknown_parent.failures.unwrap()[0].result.has_code(Code::TypeNotFound));

    let unknown_relation = v.validate_for_composition(&cancel, "Order", "payments", Some(&raws));
    assert!(unknown_relation.failures.unwrap()[0].result.has_code(Code::CompositionNotFound));
}

// ============================================================================
// 6. Cancellation and concurrency
// ============================================================================

/// Standard checking that cancels `token` when it checks `trigger` and counts
/// checks of `after`.
struct CancelOnValue {
    token: CancellationToken,
    trigger: i64,
    after: i64,
    later: AtomicUsize,
}

impl ConstraintChecker for CancelOnValue {
    fn check(&self, value: &AnyValue, c: &Constraint, registry: Option<&dyn ValueRegistry>) -> Result<(), CheckFailure> {
        if *value == AnyValue::Int(self.trigger) {
            self.token.cancel();
        }
        if *value == AnyValue::Int(self.after) {
            self.later.fetch_add(1, Ordering::SeqCst);
        }
        StandardChecker.check(value, c, registry)
    }

    fn coerce(&self, value: &AnyValue, c: &Constraint) -> Result<AnyValue, String> {
        StandardChecker.coerce(value, c)
    }
}

#[test]
fn test_cancellation_inside_child_loop() {
    let cancel = CancellationToken::new();
    let checker = Arc::new(CancelOnValue {
        token: cancel.clone(),
        trigger: 100,
        after: 101,
        later: AtomicUsize::new(0),
    });
    let v = validator().with_checker(checker.clone());
    let raws = vec![order(AnyValue::list([line(100, 2), line(101, 1)]))];

    let err = v.validate_one(&cancel, "Order", &raws[0]).unwrap_err();
    assert!(matches!(err, Error::Cancelled));

    let batch = v.validate(&cancel, "Order", Some(&raws));
    assert!(matches!(batch.error, Some(Error::Cancelled)));
    assert_eq!(batch.valid.map(|v| v.len()), Some(0));
    assert!(batch.failures.is_none());
    assert_eq!(checker.later.load(Ordering::SeqCst), 0);
}

#[test]
fn test_concurrent_composition_validation() {
    let v = validator();
    let cancel = CancellationToken::new();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4i64)
            .map(|t| {
                let (v, cancel) = (&v, &cancel);
                s.spawn(move || {
                    let raws: Vec<RawInstance> = (0..25)
                        .map(|i| {
                            let lines = AnyValue::list([line(t * 1000 + i, 1), line(t * 1000 + i + 500, 2)]);
                            // Every fifth order repeats a line key.
                            let lines = if i % 5 == 0 { AnyValue::list([line(1, 1), line(1, 1)]) } else { lines };
                            order(lines)
                        })
                        .collect();
                    v.validate(cancel, "Order", Some(&raws))
                })
            })
            .collect();
        for h in handles {
            let batch = h.join().unwrap();
            assert_eq!(batch.valid.map(|v| v.len()), Some(20));
            let failures = batch.failures.unwrap();
            assert_eq!(failures.len(), 5);
            assert!(failures.iter().all(|f| f.result.has_code(Code::DuplicateComposedPk)));
        }
    });
}
