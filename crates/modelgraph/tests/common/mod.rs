#![allow(dead_code)]

use modelgraph::prelude::*;
use std::sync::{Arc, Once};

static INIT_LOGGING: Once = Once::new();

/// Set `TEST_LOG=1` to see identity-map and deserialization traces.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        if std::env::var("TEST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
                .init();
        }
    });
}

///
/// Schema
///
/// Movie    (model)  title, year?, genres[]?
/// Director (entity) id (primary), handle? (secondary), name?, movies[]?
///

pub struct Schema {
    pub registry: Arc<Registry>,
    pub movie: Arc<ModelClass>,
    pub director: Arc<ModelClass>,
}

pub fn schema() -> Schema {
    init_test_logging();

    let movie = ModelClass::model("Movie")
        .field(FieldDef::parse("title", "string").unwrap().validator(NotEmpty))
        .field(
            FieldDef::parse("year", "number?")
                .unwrap()
                .validator(Range::new(1888.0, 2100.0)),
        )
        .field(
            FieldDef::parse("genres", "string[]?")
                .unwrap()
                .validator(MaxLength::new(4))
                .element_validator(NotEmpty),
        )
        .build()
        .unwrap();

    let director = ModelClass::entity("Director")
        .field(FieldDef::parse("id", "string").unwrap().primary())
        .field(FieldDef::parse("handle", "string?").unwrap().secondary())
        .field(FieldDef::parse("name", "string?").unwrap())
        .field(FieldDef::parse("movies", "Movie[]?").unwrap())
        .build()
        .unwrap();

    let registry = Arc::new(Registry::with_classes([&movie, &director]).unwrap());

    Schema {
        registry,
        movie,
        director,
    }
}

impl Schema {
    pub fn context(&self, source: &str) -> Context {
        Context::new(self.registry.clone()).with_source(source)
    }
}
