//! End-to-end tests for association validation: target shapes, the
//! foreign-key presence matrix, edge properties and schema faults.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use schemagate::{
    AnyValue, CancellationToken, CheckFailure, Code, Config, Constraint, ConstraintChecker, Error,
    InternalKind, Outcome, PropertyDef, RawInstance, RelationDef, Schema, StandardChecker, TypeDef,
    ValidInstance, ValidationFailure, Validator, Value, ValueRegistry,
};

// ============================================================================
// Fixtures
// ============================================================================

fn schema() -> Schema {
    Schema::new("geo")
        .with_type(
            TypeDef::new("Site")
                .with_property(PropertyDef::required("region", Constraint::string()))
                .with_property(PropertyDef::required("id", Constraint::integer()))
                .with_primary_key(["region", "id"]),
        )
        .with_type(
            TypeDef::new("Country")
                .with_property(PropertyDef::required("code", Constraint::string()))
                .with_primary_key(["code"]),
        )
        .with_type(
            TypeDef::new("Person")
                .with_property(PropertyDef::required("id", Constraint::integer()))
                .with_primary_key(["id"])
                .with_relation(RelationDef::association("lives_in", "Site"))
                .with_relation(
                    RelationDef::association("visited", "Site")
                        .many()
                        .with_edge_property(PropertyDef::required("year", Constraint::integer()))
                        .with_edge_property(PropertyDef::optional("note", Constraint::string())),
                )
                .with_relation(RelationDef::association("citizen_of", "Country")),
        )
}

fn validator() -> Validator {
    Validator::new(Arc::new(schema()), Config::default())
}

fn person_with(field: &str, value: AnyValue) -> RawInstance {
    RawInstance::from_pairs([("id", AnyValue::from(1)), (field, value)])
}

fn site(region: &str, id: i64) -> AnyValue {
    AnyValue::map([("_target_region", AnyValue::from(region)), ("_target_id", AnyValue::from(id))])
}

fn run(raw: &RawInstance) -> Outcome {
    validator().validate_one(&CancellationToken::new(), "Person", raw).unwrap()
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
// 1. Single-valued associations
// ============================================================================

#[test]
fn test_single_target() {
    let person = valid(&person_with("lives_in", site("us", 12345)));
    let edge = person.edge("lives_in").unwrap();
    assert_eq!(edge.target_type, "Site");
    assert_eq!(edge.len(), 1);
    let keys: Vec<String> = edge.keys().map(ToString::to_string).collect();
    assert_eq!(keys, vec![r#"["us",12345]"#]);
}

#[test]
fn test_absent_association_is_fine() {
    let person = valid(&RawInstance::from_pairs([("id", 1)]));
    assert!(person.edge("lives_in").is_none());
    assert_eq!(person.edges().count(), 0);
}

#[test]
fn test_fk_fields_are_coerced() {
    let target = AnyValue::map([("_target_region", AnyValue::from("us")), ("_target_id", AnyValue::Uint(9))]);
    let person = valid(&person_with("lives_in", target));
    let key = &person.edge("lives_in").unwrap().targets[0].key;
    assert_eq!(key.get(1), &Value::Int(9));
}

#[test]
fn test_null_and_wrong_shapes() {
    let failure = invalid(&person_with("lives_in", AnyValue::Null));
    assert_eq!(codes(&failure), vec![Code::EdgeShapeMismatch]);
    let issue = &failure.result.issues()[0];
    assert_eq!(issue.detail_value("expected"), Some("object"));
    assert_eq!(issue.detail_value("got"), Some("null"));

    let failure = invalid(&person_with("visited", AnyValue::Null));
    assert_eq!(failure.result.issues()[0].detail_value("expected"), Some("array"));

    let failure = invalid(&person_with("visited", site("us", 1)));
    assert_eq!(codes(&failure), vec![Code::EdgeShapeMismatch]);
    assert_eq!(failure.result.issues()[0].message, r#"relation "visited": expected array, got object"#);
}

// ============================================================================
// 2. Foreign-key presence matrix
// ============================================================================

#[test]
fn test_no_fk_fields() {
    let failure = invalid(&person_with("lives_in", AnyValue::map::<&str, AnyValue>([])));
    assert_eq!(codes(&failure), vec![Code::MissingFkTarget]);
    let issue = &failure.result.issues()[0];
    assert_eq!(issue.detail_value("expected"), Some("_target_region, _target_id"));
    assert_eq!(issue.detail_value("relation"), Some("lives_in"));
    assert_eq!(issue.path.as_deref(), Some("lives_in"));
}

#[test]
fn test_partial_composite_fk() {
    let failure = invalid(&person_with("lives_in", AnyValue::map([("_target_region", "us")])));
    assert_eq!(codes(&failure), vec![Code::PartialCompositeFk]);
    let issue = &failure.result.issues()[0];
    assert_eq!(issue.detail_value("expected"), Some("_target_region, _target_id"));
    assert_eq!(issue.detail_value("got"), Some("_target_region"));
}

#[test]
fn test_partial_composite_fk_with_null() {
    let failure = invalid(&person_with("lives_in", AnyValue::map([("_target_id", AnyValue::Null)])));
    assert_eq!(codes(&failure), vec![Code::PartialCompositeFk, Code::TypeMismatch]);
    assert_eq!(failure.result.issues()[1].path.as_deref(), Some("lives_in._target_id"));
}

#[test]
fn test_complete_fk_with_null_is_type_mismatch_only() {
    let target = AnyValue::map([("_target_region", AnyValue::from("us")), ("_target_id", AnyValue::Null)]);
    let failure = invalid(&person_with("lives_in", target));
    assert_eq!(codes(&failure), vec![Code::TypeMismatch]);
    let issue = &failure.result.issues()[0];
    assert!(issue.message.ends_with("expected integer, got null"), "{}", issue.message);
    assert_eq!(issue.path.as_deref(), Some("lives_in._target_id"));
}

#[test]
fn test_fk_value_checked_against_key_property() {
    let target = AnyValue::map([("_target_region", AnyValue::from("us")), ("_target_id", AnyValue::from("x"))]);
    let failure = invalid(&person_with("lives_in", target));
    assert_eq!(codes(&failure), vec![Code::TypeMismatch]);
    assert_eq!(failure.result.issues()[0].detail_value("field"), Some("_target_id"));
}

#[test]
fn test_fk_fields_are_case_sensitive() {
    let failure = invalid(&person_with("citizen_of", AnyValue::map([("_Target_code", "DE")])));
    assert_eq!(codes(&failure), vec![Code::MissingFkTarget, Code::UnknownEdgeField]);
    assert_eq!(failure.result.issues()[1].detail_value("json_field"), Some("_Target_code"));
}

// ============================================================================
// 3. Many-valued associations and edge properties
// ============================================================================

fn visit(region: &str, id: i64, year: AnyValue) -> AnyValue {
    AnyValue::map([
        ("_target_region", AnyValue::from(region)),
        ("_target_id", AnyValue::from(id)),
        ("year", year),
    ])
}

#[test]
fn test_many_targets_with_edge_properties() {
    let visits = AnyValue::list([visit("us", 1, 2019.into()), visit("eu", 2, 2021.into())]);
    let person = valid(&person_with("visited", visits));
    let edge = person.edge("visited").unwrap();
    assert_eq!(edge.len(), 2);
    assert_eq!(edge.targets[1].key.as_str(), r#"["eu",2]"#);
    assert_eq!(edge.targets[0].properties.get("year"), Some(&Value::Int(2019)));
}

#[test]
fn test_empty_many_relation() {
    let person = valid(&person_with("visited", AnyValue::list(Vec::<AnyValue>::new())));
    assert!(person.edge("visited").unwrap().is_empty());
}

#[test]
fn test_every_target_is_checked() {
    let visits = AnyValue::list([
        visit("us", 1, "last year".into()),
        AnyValue::from("oops"),
        AnyValue::map([("_target_region", AnyValue::from("eu")), ("year", AnyValue::from(2020))]),
    ]);
    let failure = invalid(&person_with("visited", visits));
    assert_eq!(codes(&failure), vec![Code::TypeMismatch, Code::EdgeShapeMismatch, Code::PartialCompositeFk]);

    let paths: Vec<Option<&str>> = failure.result.iter().map(|i| i.path.as_deref()).collect();
    assert_eq!(paths, vec![Some("visited[0].year"), Some("visited[1]"), Some("visited[2]")]);
    assert!(failure.result.iter().all(|i| i.detail_value("relation") == Some("visited")));
}

#[test]
fn test_edge_property_rules() {
    let mut target = vec![("_target_region", AnyValue::from("us")), ("_target_id", AnyValue::from(1))];
    target.push(("colour", AnyValue::from("red")));
    let failure = invalid(&person_with("visited", AnyValue::list([AnyValue::map(target)])));
    assert_eq!(codes(&failure), vec![Code::UnknownEdgeField, Code::MissingRequired]);
    assert_eq!(failure.result.issues()[1].path.as_deref(), Some("visited[0].year"));
}

#[test]
fn test_edge_property_names_fold() {
    let target = AnyValue::map([
        ("_target_region", AnyValue::from("us")),
        ("_target_id", AnyValue::from(1)),
        ("YEAR", AnyValue::from(2000)),
    ]);
    let person = valid(&person_with("visited", AnyValue::list([target])));
    let props = &person.edge("visited").unwrap().targets[0].properties;
    assert_eq!(props.get("year"), Some(&Value::Int(2000)));
}

#[test]
fn test_relation_name_folds() {
    let person = valid(&person_with("Lives_In", site("us", 5)));
    assert!(person.edge("lives_in").is_some());
}

// ============================================================================
// 4. Schema faults
// ============================================================================

#[test]
fn test_association_to_unkeyed_or_unknown_type() {
    let schema = Schema::new("app")
        .with_type(TypeDef::new("Note"))
        .with_type(
            TypeDef::new("Doc")
                .with_relation(RelationDef::association("note", "Note"))
                .with_relation(RelationDef::association("ghost", "Nowhere")),
        );
    let v = Validator::new(Arc::new(schema), Config::default());
    let cancel = CancellationToken::new();

    for field in ["note", "ghost"] {
        let raw = RawInstance::from_pairs([(field, AnyValue::map([("_target_id", 1)]))]);
        let err = v.validate_one(&cancel, "Doc", &raw).unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalKind::CorruptedSchema), "{field}");
    }
}

// ============================================================================
// 5. Cancellation and concurrency
// ============================================================================

/// Standard checking that cancels `token` on the first `"us"` it sees and
/// counts how often `"eu"` is checked.
struct CancelOnRegion {
    token: CancellationToken,
    later: AtomicUsize,
}

impl ConstraintChecker for CancelOnRegion {
    fn check(&self, value: &AnyValue, c: &Constraint, registry: Option<&dyn ValueRegistry>) -> Result<(), CheckFailure> {
        match value {
            AnyValue::String(s) if s == "us" => self.token.cancel(),
            AnyValue::String(s) if s == "eu" => {
                self.later.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
        StandardChecker.check(value, c, registry)
    }

    fn coerce(&self, value: &AnyValue, c: &Constraint) -> Result<AnyValue, String> {
        StandardChecker.coerce(value, c)
    }
}

#[test]
fn test_cancellation_inside_target_loop() {
    let cancel = CancellationToken::new();
    let checker = Arc::new(CancelOnRegion { token: cancel.clone(), later: AtomicUsize::new(0) });
    let v = validator().with_checker(checker.clone());
    let visits = AnyValue::list([visit("us", 1, 2019.into()), visit("eu", 2, 2021.into())]);
    let raws = vec![person_with("visited", visits)];

    let batch = v.validate(&cancel, "Person", Some(&raws));
    assert!(matches!(batch.error, Some(Error::Cancelled)));
    assert_eq!(batch.valid.map(|v| v.len()), Some(0));
    assert!(batch.failures.is_none());
    assert_eq!(checker.later.load(Ordering::SeqCst), 0);
}

#[test]
fn test_validator_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Validator>();

    let v = validator();
    let cancel = CancellationToken::new();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4i64)
            .map(|t| {
                let (v, cancel) = (&v, &cancel);
                s.spawn(move || {
                    let visits: Vec<AnyValue> = (0..20).map(|i| visit("us", t * 100 + i, 2000.into())).collect();
                    let raw = person_with("visited", AnyValue::list(visits));
                    v.validate_one(cancel, "Person", &raw).unwrap().valid().unwrap()
                })
            })
            .collect();
        for (t, h) in handles.into_iter().enumerate() {
            let person = h.join().unwrap();
            let edge = person.edge("visited").unwrap();
            assert_eq!(edge.len(), 20);
            assert_eq!(edge.targets[0].key.to_string(), format!(r#"["us",{}]"#, t * 100));
        }
    });
}
