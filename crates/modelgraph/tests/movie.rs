mod common;

use common::schema;
use modelgraph::{ErrorClass, prelude::*};
use serde_json::json;

fn inception(ctx: &Context, schema: &common::Schema) -> Model {
    Model::new(&schema.movie, &Record::new().with("title", "Inception"), ctx).unwrap()
}

#[test]
fn new_movie_serializes_with_nulls_for_unset_optionals() {
    let schema = schema();
    let ctx = schema.context("local");
    let movie = inception(&ctx, &schema);

    let json = movie.serialize(&SerializeOptions::default(), &ctx).unwrap();

    assert_eq!(
        json,
        json!({
            "_type": "Movie",
            "_new": true,
            "title": "Inception",
            "year": null,
            "genres": null
        })
    );
}

#[test]
fn empty_genre_is_reported_at_its_position() {
    let schema = schema();
    let ctx = schema.context("local");
    let movie = inception(&ctx, &schema);
    movie.set_field("genres", vec!["Drama", ""], &ctx).unwrap();

    let tree = movie.failed_validators(None);
    assert_eq!(tree.to_json(), json!({"genres": [[null, ["notEmpty"]]]}));

    let err = movie
        .serialize(&SerializeOptions::default(), &ctx)
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    assert_eq!(err.validation_failures(), Some(&tree));
}

#[test]
fn builtin_validators_render_their_arguments() {
    let schema = schema();
    let ctx = schema.context("local");
    let movie = inception(&ctx, &schema);
    movie.set_field("year", 1700, &ctx).unwrap();
    movie
        .set_field("genres", vec!["a", "b", "c", "d", "e"], &ctx)
        .unwrap();

    let tree = movie.failed_validators(None);

    assert_eq!(
        tree.to_json(),
        json!({
            "year": [["range", 1888.0, 2100.0]],
            "genres": [[null, null, null, null, null], [["maxLength", 4]]]
        })
    );
}

#[test]
fn masked_validation_ignores_other_fields() {
    let schema = schema();
    let ctx = schema.context("local");
    let movie = inception(&ctx, &schema);
    movie.set_field("title", "", &ctx).unwrap();
    movie.set_field("year", 2010, &ctx).unwrap();

    let mask = FieldMask::of(["year"]);

    assert!(movie.validate(Some(&mask)).is_ok());
    assert!(movie.validate(None).is_err());
    assert!(
        movie
            .serialize(&SerializeOptions::default().mask(mask), &ctx)
            .is_ok()
    );
}

#[test]
fn edits_can_be_committed_or_rolled_back() {
    let schema = schema();
    let ctx = schema.context("local");
    let movie = inception(&ctx, &schema);
    movie.commit();
    assert!(!movie.is_changed());

    movie.set_field("title", "Interstellar", &ctx).unwrap();
    movie.set_field("title", "Tenet", &ctx).unwrap();
    assert!(movie.is_field_changed("title").unwrap());

    movie.rollback().unwrap();
    assert_eq!(movie.get_field("title").unwrap(), Value::from("Inception"));
    assert!(!movie.is_changed());

    movie.set_field("title", "Tenet", &ctx).unwrap();
    movie.commit();
    movie.rollback().unwrap();
    assert_eq!(movie.get_field("title").unwrap(), Value::from("Tenet"));
}

#[test]
fn wrong_field_type_is_a_type_mismatch() {
    let schema = schema();
    let ctx = schema.context("local");
    let movie = inception(&ctx, &schema);

    let err = movie.set_field("year", "soon", &ctx).unwrap_err();

    assert_eq!(err.class(), ErrorClass::TypeMismatch);
    assert_eq!(movie.get_field("year").unwrap(), Value::Null);
}
