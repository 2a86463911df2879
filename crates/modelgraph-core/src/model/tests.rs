use super::*;
use crate::{
    context::SourceId,
    error::Error,
    mask::FieldMask,
    observe::ModelEvent,
    serialize::DeserializeOptions,
    test_fixtures::fixtures,
    value::{Record, Value},
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn movie(f: &crate::test_fixtures::Fixtures, title: &str) -> Model {
    Model::new(&f.movie, &Record::new().with("title", title), &f.ctx).unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn new_instance_activates_every_field() {
    let f = fixtures();
    let m = movie(&f, "Inception");

    assert!(m.is_new());
    assert_eq!(m.active_fields(), vec!["title", "year", "genres"]);
    assert_eq!(m.get_field("title").unwrap(), Value::from("Inception"));
    assert_eq!(m.get_field("year").unwrap(), Value::Null);
    assert_eq!(m.get_field("genres").unwrap(), Value::Null);
    assert!(!m.is_changed());
}

#[test]
fn defaults_apply_to_new_instances_only() {
    let f = fixtures();
    let e = Model::new(&f.employee, &Record::new().with("id", "e1"), &f.ctx).unwrap();
    assert_eq!(e.get_field("role").unwrap(), Value::from("staff"));

    let payload = json!({"_type": "Employee", "id": "e2"});
    let d = Model::deserialize(&f.employee, &payload, &DeserializeOptions::default(), &f.ctx)
        .unwrap();
    assert!(!d.model.is_new());
    assert!(!d.model.is_active("role"));
}

#[test]
fn default_producer_sees_earlier_fields() {
    let f = fixtures();
    let class = ModelClass::model("Slugged")
        .field(FieldDef::parse("title", "string").unwrap())
        .field(
            FieldDef::parse("slug", "string")
                .unwrap()
                .default_with(|m| match m.get_field("title") {
                    Ok(Value::Text(t)) => Value::Text(t.to_lowercase().replace(' ', "-")),
                    _ => Value::Undefined,
                }),
        )
        .build()
        .unwrap();

    let m = Model::new(&class, &Record::new().with("title", "Hello World"), &f.ctx).unwrap();

    assert_eq!(m.get_field("slug").unwrap(), Value::from("hello-world"));
}

#[test]
fn producer_yielding_undefined_is_skipped() {
    let f = fixtures();
    let class = ModelClass::model("Lazy")
        .field(FieldDef::parse("note", "string").unwrap().default_with(|_| Value::Undefined))
        .build()
        .unwrap();

    let m = Model::new(&class, &Record::new(), &f.ctx).unwrap();

    assert_eq!(m.get_field("note").unwrap(), Value::Undefined);
}

#[test]
fn masked_construction_reports_missing_fields() {
    let f = fixtures();
    let mask = FieldMask::of(["title", "year"]);

    let (m, missing) =
        Model::new_masked(&f.movie, &Record::new().with("title", "Heat"), &mask, &f.ctx).unwrap();

    assert_eq!(missing, FieldMask::of(["year"]));
    assert!(!m.is_active("genres"));
    assert_eq!(m.get_field("year").unwrap(), Value::Null);
}

#[test]
fn nested_records_become_instances() {
    let f = fixtures();
    let record = Record::new()
        .with("id", "p1")
        .with("address", Record::new().with("street", "Main St"));

    let p = Model::new(&f.person, &record, &f.ctx).unwrap();
    let address = p.get_field("address").unwrap();
    let address = address.as_model().unwrap();

    assert!(address.class().is_a("Address"));
    assert_eq!(address.get_field("street").unwrap(), Value::from("Main St"));
    assert_eq!(address.source_of("street"), Some(SourceId::from("local")));
}

#[test]
fn subclass_records_are_accepted_for_parent_fields() {
    let f = fixtures();
    let record = Record::new().with("id", "p1").with(
        "friends",
        vec![Value::from(Record::typed("Employee").with("id", "e1"))],
    );

    let p = Model::new(&f.person, &record, &f.ctx).unwrap();
    let friends = p.get_field("friends").unwrap();
    let friend = friends.as_list().unwrap()[0].as_model().unwrap().clone();

    assert_eq!(friend.class().name(), "Employee");
    assert_eq!(friend.get_field("role").unwrap(), Value::from("staff"));
}

#[test]
fn unrelated_model_is_a_type_mismatch() {
    let f = fixtures();
    let p = Model::new(&f.person, &Record::new().with("id", "p1"), &f.ctx).unwrap();
    let m = movie(&f, "Alien");

    let err = p.set_field("address", m, &f.ctx).unwrap_err();

    assert!(matches!(err, Error::TypeMismatch { ref field, .. } if field == "address"));
}

// ============================================================================
// Get / set
// ============================================================================

#[test]
fn unknown_field_is_not_found() {
    let f = fixtures();
    let m = movie(&f, "Up");

    assert!(matches!(m.get_field("plot"), Err(Error::FieldNotFound { .. })));
    assert!(matches!(
        m.set_field("plot", "x", &f.ctx),
        Err(Error::FieldNotFound { .. })
    ));
}

#[test]
fn inactive_field_cannot_be_read() {
    let f = fixtures();
    let payload = json!({"_type": "Movie", "title": "Up"});
    let m = Model::deserialize(&f.movie, &payload, &DeserializeOptions::default(), &f.ctx)
        .unwrap()
        .model;

    assert!(matches!(
        m.get_field("year"),
        Err(Error::FieldNotActive { ref field, .. }) if field == "year"
    ));
}

#[test]
fn array_field_reads_as_persisted_empty_list() {
    let f = fixtures();
    let a = Model::new(&f.address, &Record::new().with("street", "Elm"), &f.ctx).unwrap();

    assert_eq!(a.get_field("tags").unwrap(), Value::List(vec![]));

    a.edit_field("tags", |v| {
        if let Value::List(items) = v {
            items.push(Value::from("corner"));
        }
    })
    .unwrap();

    assert_eq!(a.get_field("tags").unwrap(), Value::list(["corner"]));
    assert!(!a.is_changed());
}

#[test]
fn mismatched_value_leaves_field_untouched() {
    let f = fixtures();
    let m = movie(&f, "Up");

    let err = m.set_field("year", "soon", &f.ctx).unwrap_err();
    assert_eq!(err.class(), crate::ErrorClass::TypeMismatch);
    assert!(matches!(m.set_field("title", Value::Null, &f.ctx), Err(Error::TypeMismatch { .. })));
    assert!(matches!(
        m.set_field("genres", vec![Value::from(1)], &f.ctx),
        Err(Error::TypeMismatch { .. })
    ));

    assert_eq!(m.get_field("year").unwrap(), Value::Null);
    assert!(!m.is_changed());
}

#[test]
fn set_records_source() {
    let f = fixtures();
    let m = movie(&f, "Up");

    m.set_field("year", 2009, &f.ctx).unwrap();
    assert_eq!(m.source_of("year"), Some(SourceId::from("local")));

    let options = SetOptions {
        source: Some(SourceId::from("peer")),
        deserialize: false,
    };
    m.set_field_with("year", 2010, options, &f.ctx).unwrap();
    assert_eq!(m.source_of("year"), Some(SourceId::from("peer")));
}

#[test]
fn assign_checks_every_name_first() {
    let f = fixtures();
    let m = movie(&f, "Up");

    let bad = Record::new().with("year", 2009).with("plot", "balloons");
    assert!(matches!(m.assign(&bad, &f.ctx), Err(Error::FieldNotFound { .. })));
    assert_eq!(m.get_field("year").unwrap(), Value::Null);

    let good = Record::new().with("year", 2009).with("genres", vec!["family"]);
    m.assign(&good, &f.ctx).unwrap();
    assert_eq!(m.get_field("year").unwrap(), Value::from(2009));
    assert!(m.is_field_changed("genres").unwrap());
}

#[test]
fn assign_mismatch_changes_nothing() {
    let f = fixtures();
    let m = movie(&f, "Up");

    let bad = Record::new().with("title", "Down").with("year", "soon");
    let err = m.assign(&bad, &f.ctx).unwrap_err();

    assert!(matches!(err, Error::TypeMismatch { .. }));
    assert_eq!(m.get_field("title").unwrap(), Value::from("Up"));
    assert!(!m.is_changed());
}

#[test]
fn fields_active_follows_mask() {
    let f = fixtures();
    let payload = json!({
        "_type": "Person",
        "id": "p1",
        "address": {"_type": "Address", "street": "Elm"}
    });
    let p = Model::deserialize(&f.person, &payload, &DeserializeOptions::default(), &f.ctx)
        .unwrap()
        .model;

    let shallow = FieldMask::of(["id"]).with("address", FieldMask::of(["street"]));
    assert!(p.fields_active(&shallow));

    let deeper = FieldMask::of(["id"]).with("address", FieldMask::of(["street", "city"]));
    assert!(!p.fields_active(&deeper));
    assert!(!p.fields_active(&FieldMask::of(["name"])));
    assert!(!p.fields_active(&FieldMask::of(["nope"])));
}

// ============================================================================
// Change tracking
// ============================================================================

#[test]
fn rollback_restores_value_before_first_change() {
    let f = fixtures();
    let m = movie(&f, "Up");

    m.set_field("title", "Down", &f.ctx).unwrap();
    m.set_field("title", "Sideways", &f.ctx).unwrap();
    assert!(m.is_changed());
    assert!(m.is_field_changed("title").unwrap());
    assert!(!m.is_field_changed("year").unwrap());

    m.rollback().unwrap();

    assert_eq!(m.get_field("title").unwrap(), Value::from("Up"));
    assert!(!m.is_changed());
}

#[test]
fn commit_clears_snapshots() {
    let f = fixtures();
    let m = movie(&f, "Up");

    m.set_field("year", 2009, &f.ctx).unwrap();
    m.commit();
    assert!(!m.is_changed());

    m.rollback().unwrap();
    assert_eq!(m.get_field("year").unwrap(), Value::from(2009));
}

#[test]
fn rollback_restores_inactive_fields() {
    let f = fixtures();
    let payload = json!({"_type": "Movie", "title": "Up"});
    let m = Model::deserialize(&f.movie, &payload, &DeserializeOptions::default(), &f.ctx)
        .unwrap()
        .model;

    m.set_field("year", 2009, &f.ctx).unwrap();
    assert!(m.is_active("year"));

    m.rollback().unwrap();

    assert!(!m.is_active("year"));
    assert!(m.source_of("year").is_none());
}

#[test]
fn tracking_spans_plain_submodels() {
    let f = fixtures();
    let record = Record::new()
        .with("id", "p1")
        .with("address", Record::new().with("street", "Elm"));
    let p = Model::new(&f.person, &record, &f.ctx).unwrap();
    let address = p.get_field("address").unwrap().as_model().unwrap().clone();

    address.set_field("street", "Oak", &f.ctx).unwrap();

    assert!(p.is_changed());
    assert!(p.is_field_changed("address").unwrap());
    assert!(!p.is_field_changed("name").unwrap());

    p.rollback().unwrap();
    assert_eq!(address.get_field("street").unwrap(), Value::from("Elm"));

    address.set_field("street", "Pine", &f.ctx).unwrap();
    p.commit();
    assert!(!address.is_changed());
}

#[test]
fn tracking_does_not_enter_entities() {
    let f = fixtures();
    let owner = Model::new(&f.person, &Record::new().with("id", "p1"), &f.ctx).unwrap();
    let studio = Model::new(
        &f.studio,
        &Record::new().with("code", 7).with("owner", owner.clone()),
        &f.ctx,
    )
    .unwrap();

    owner.set_field("name", "Ada", &f.ctx).unwrap();

    assert!(owner.is_changed());
    assert!(!studio.is_changed());
    studio.commit();
    assert!(owner.is_changed());
}

#[test]
fn rollback_blocked_by_claimed_identifier_keeps_changes() {
    let f = fixtures();
    let record = Record::new()
        .with("id", "pa")
        .with("email", "old@x")
        .with("address", Record::new().with("street", "Elm"));
    let a = Model::new(&f.person, &record, &f.ctx).unwrap();
    let address = a.get_field("address").unwrap().as_model().unwrap().clone();

    a.set_field("email", "new@x", &f.ctx).unwrap();
    a.set_field("name", "Changed", &f.ctx).unwrap();
    address.set_field("street", "Oak", &f.ctx).unwrap();

    let b = Model::new(
        &f.person,
        &Record::new().with("id", "pb").with("email", "old@x"),
        &f.ctx,
    )
    .unwrap();

    let err = a.rollback().unwrap_err();
    assert!(matches!(err, Error::DuplicateIdentifier { .. }));
    assert_eq!(a.get_field("email").unwrap(), Value::from("new@x"));
    assert_eq!(a.get_field("name").unwrap(), Value::from("Changed"));
    assert_eq!(address.get_field("street").unwrap(), Value::from("Oak"));
    assert!(a.is_changed());

    // once the other holder is gone the rollback goes through
    drop(b);
    a.rollback().unwrap();

    assert_eq!(a.get_field("email").unwrap(), Value::from("old@x"));
    assert_eq!(a.get_field("name").unwrap(), Value::Null);
    assert_eq!(address.get_field("street").unwrap(), Value::from("Elm"));
    assert!(!a.is_changed());

    let map = f.person.identity_map().unwrap();
    let key = crate::identity::IdentityKey::Text("old@x".into());
    assert!(map.lookup("email", &key).unwrap().ptr_eq(&a));
}

// ============================================================================
// Observation
// ============================================================================

#[test]
fn subscribers_see_each_mutation() {
    let f = fixtures();
    let m = movie(&f, "Up");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let subscription = m.subscribe(move |_, event| sink.lock().unwrap().push(event.clone()));

    m.set_field("year", 2009, &f.ctx).unwrap();
    m.set_field("year", 2010, &f.ctx).unwrap();
    m.notify("genres").unwrap();

    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[0],
            ModelEvent::FieldChanged {
                field: "year".to_string(),
                source: Some(SourceId::from("local")),
            }
        );
        assert_eq!(seen[2].field(), "genres");
    }

    assert!(subscription.cancel());
    m.set_field("year", 2011, &f.ctx).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 3);
    assert_eq!(m.subscriber_count(), 0);
}

#[test]
fn dropping_subscription_unsubscribes() {
    let f = fixtures();
    let m = movie(&f, "Up");

    {
        let _subscription = m.subscribe(|_, _| {});
        assert_eq!(m.subscriber_count(), 1);
    }

    assert_eq!(m.subscriber_count(), 0);

    m.subscribe(|_, _| {}).forget();
    assert_eq!(m.subscriber_count(), 1);
}

#[test]
fn subscriber_added_during_delivery_misses_that_event() {
    let f = fixtures();
    let m = movie(&f, "Up");
    let late_hits = Arc::new(Mutex::new(0));
    let late = Arc::new(Mutex::new(Vec::new()));

    let hits = Arc::clone(&late_hits);
    let subs = Arc::clone(&late);
    let _first = m.subscribe(move |model, _| {
        let mut subs = subs.lock().unwrap();
        if subs.is_empty() {
            let hits = Arc::clone(&hits);
            subs.push(model.subscribe(move |_, _| *hits.lock().unwrap() += 1));
        }
    });

    m.set_field("title", "Cars", &f.ctx).unwrap();
    assert_eq!(*late_hits.lock().unwrap(), 0);
    assert_eq!(m.subscriber_count(), 2);

    m.set_field("title", "Coco", &f.ctx).unwrap();
    assert_eq!(*late_hits.lock().unwrap(), 1);
}

#[test]
fn listener_may_read_the_instance() {
    let f = fixtures();
    let m = movie(&f, "Up");
    let seen = Arc::new(Mutex::new(None));

    let sink = Arc::clone(&seen);
    let _subscription = m.subscribe(move |model, event| {
        *sink.lock().unwrap() = model.get_field(event.field()).ok();
    });

    m.set_field("title", "Down", &f.ctx).unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(Value::from("Down")));
}

// ============================================================================
// Class building
// ============================================================================

#[test]
fn subclass_inherits_fields_and_lineage() {
    let f = fixtures();

    let names: Vec<_> = f.employee.fields().iter().map(|field| field.name()).collect();
    assert_eq!(names, ["id", "email", "name", "address", "friends", "born", "role"]);
    assert!(f.employee.is_a("Person"));
    assert!(!f.person.is_a("Employee"));
    assert!(Arc::ptr_eq(
        f.employee.identity_map().unwrap(),
        f.person.identity_map().unwrap()
    ));
}

#[test]
fn override_must_keep_scalar_and_arity() {
    let base = ModelClass::model("Base")
        .field(FieldDef::parse("n", "number").unwrap())
        .build()
        .unwrap();

    let relaxed = ModelClass::model("Relaxed")
        .extends(&base)
        .field(FieldDef::parse("n", "number?").unwrap())
        .build()
        .unwrap();
    assert!(relaxed.field("n").unwrap().is_optional());

    let err = ModelClass::model("Broken")
        .extends(&base)
        .field(FieldDef::parse("n", "string").unwrap())
        .build()
        .unwrap_err();
    assert!(matches!(err, ClassBuildError::IncompatibleOverride { .. }));
}

#[test]
fn builder_rejects_bad_identifiers() {
    let err = ModelClass::model("M")
        .field(FieldDef::parse("id", "string").unwrap().primary())
        .build()
        .unwrap_err();
    assert!(matches!(err, ClassBuildError::IdentifierOnModel { .. }));

    let err = ModelClass::entity("E")
        .field(FieldDef::parse("a", "string").unwrap().primary())
        .field(FieldDef::parse("b", "number").unwrap().primary())
        .build()
        .unwrap_err();
    assert!(matches!(err, ClassBuildError::MultiplePrimaryIdentifiers { .. }));

    let err = ModelClass::entity("E")
        .field(FieldDef::parse("tags", "string[]").unwrap().secondary())
        .build()
        .unwrap_err();
    assert!(matches!(err, ClassBuildError::InvalidIdentifierType { .. }));

    let err = ModelClass::entity("E")
        .field(FieldDef::parse("a", "string").unwrap())
        .field(FieldDef::parse("a", "string").unwrap())
        .build()
        .unwrap_err();
    assert!(matches!(err, ClassBuildError::DuplicateField { .. }));
}

#[test]
fn model_cannot_extend_entity() {
    let f = fixtures();

    let err = ModelClass::model("Profile").extends(&f.person).build().unwrap_err();

    assert!(matches!(err, ClassBuildError::ModelExtendsEntity { .. }));
}

#[test]
fn field_type_text_form() {
    let ty: FieldType = "Person[]?".parse().unwrap();

    assert_eq!(ty.model_name(), Some("Person"));
    assert!(ty.array && ty.optional);
    assert_eq!(ty.to_string(), "Person[]?");
    assert_eq!("Date".parse::<FieldType>().unwrap(), FieldType::primitive(Primitive::Date));
    assert!("".parse::<FieldType>().is_err());
    assert!("string[]x".parse::<FieldType>().is_err());
}
