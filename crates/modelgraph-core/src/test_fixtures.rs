use crate::{
    context::Context,
    model::{FieldDef, ModelClass},
    registry::Registry,
    validate::Validator,
    value::Value,
};
use std::sync::Arc;

///
/// NotEmpty
/// Fails on empty strings and empty lists.
///

#[derive(Debug)]
pub struct NotEmpty;

impl Validator for NotEmpty {
    fn name(&self) -> &str {
        "notEmpty"
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::Text(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            _ => true,
        }
    }
}

///
/// MaxItems
///

#[derive(Debug)]
pub struct MaxItems(pub usize);

impl Validator for MaxItems {
    fn name(&self) -> &str {
        "maxItems"
    }

    fn args(&self) -> Vec<serde_json::Value> {
        vec![self.0.into()]
    }

    fn validate(&self, value: &Value) -> bool {
        value.as_list().is_none_or(|items| items.len() <= self.0)
    }
}

fn field(name: &str, ty: &str) -> FieldDef {
    FieldDef::parse(name, ty).unwrap()
}

///
/// Fixtures
///
/// A fresh set of classes per call, so every test gets its own identity
/// maps.
///
/// Movie    (model)  title, year?, genres[]? (per-element notEmpty, maxItems 3)
/// Address  (model)  street, city?, tags[]
/// Person   (entity) id (primary), email? (secondary), name?, address?, friends[]?, born?
/// Employee (entity) extends Person with role (default "staff")
/// Studio   (entity) code (number primary), name?, movies[]?, owner?
///

pub struct Fixtures {
    pub ctx: Context,
    pub movie: Arc<ModelClass>,
    pub address: Arc<ModelClass>,
    pub person: Arc<ModelClass>,
    pub employee: Arc<ModelClass>,
    pub studio: Arc<ModelClass>,
}

pub fn fixtures() -> Fixtures {
    let movie = ModelClass::model("Movie")
        .field(field("title", "string").validator(NotEmpty))
        .field(field("year", "number?"))
        .field(
            field("genres", "string[]?")
                .validator(MaxItems(3))
                .element_validator(NotEmpty),
        )
        .build()
        .unwrap();

    let address = ModelClass::model("Address")
        .field(field("street", "string").validator(NotEmpty))
        .field(field("city", "string?"))
        .field(field("tags", "string[]"))
        .build()
        .unwrap();

    let person = ModelClass::entity("Person")
        .field(field("id", "string").primary())
        .field(field("email", "string?").secondary())
        .field(field("name", "string?"))
        .field(field("address", "Address?"))
        .field(field("friends", "Person[]?"))
        .field(field("born", "Date?"))
        .build()
        .unwrap();

    let employee = ModelClass::entity("Employee")
        .extends(&person)
        .share_identity_map()
        .field(field("role", "string").default_value("staff"))
        .build()
        .unwrap();

    let studio = ModelClass::entity("Studio")
        .field(field("code", "number").primary())
        .field(field("name", "string?"))
        .field(field("movies", "Movie[]?"))
        .field(field("owner", "Person?"))
        .build()
        .unwrap();

    let registry =
        Registry::with_classes([&movie, &address, &person, &employee, &studio]).unwrap();
    let ctx = Context::new(Arc::new(registry)).with_source("local");

    Fixtures {
        ctx,
        movie,
        address,
        person,
        employee,
        studio,
    }
}
