use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::params::{get_optional_str, get_required_i64, get_required_name, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Person;
use crate::registry;
use crate::store::{KvRepository, FACILITATORS_KEY, SECRETARIAT_KEY, STAFF_KEY};
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use tracing::info;

#[derive(Clone, Copy)]
enum PeopleKind {
    Facilitators,
    Staff,
    Secretariat,
}

impl PeopleKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "facilitators" => Some(Self::Facilitators),
            "staff" => Some(Self::Staff),
            "secretariat" => Some(Self::Secretariat),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Facilitators => FACILITATORS_KEY,
            Self::Staff => STAFF_KEY,
            Self::Secretariat => SECRETARIAT_KEY,
        }
    }

    /// Field holding the generated code, and its prefix.
    fn code_field(self) -> (&'static str, &'static str) {
        match self {
            Self::Facilitators => ("facilitatorId", "FAC"),
            Self::Staff => ("staffId", "STF"),
            Self::Secretariat => ("secretariatId", "SEC"),
        }
    }

    /// Stored key as the dashboard writes it, paired with the English request alias.
    fn metadata_fields(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Facilitators => &[
                ("noMatrik", "matricNo"),
                ("fakulti", "faculty"),
                ("noTelefon", "phone"),
            ],
            Self::Staff => &[
                ("icNo", "icNo"),
                ("jawatanGred", "gradePosition"),
                ("kelayakanAkademik", "academicQualification"),
                ("latarBelakangJawatan", "positionBackground"),
                ("pengalamanKerja", "workExperience"),
            ],
            Self::Secretariat => &[("jawatan", "position"), ("bahagian", "division")],
        }
    }
}

fn parse_kind(params: &Value) -> Result<PeopleKind, HandlerErr> {
    let raw = get_required_str(params, "kind")?;
    PeopleKind::parse(&raw).ok_or_else(|| {
        HandlerErr::bad_params("kind must be one of: facilitators, staff, secretariat")
    })
}

fn people_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let kind = parse_kind(params)?;
    let people = KvRepository::new(conn).load_people(kind.key());
    Ok(json!({ "people": people }))
}

fn people_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let kind = parse_kind(params)?;
    let name = get_required_name(params)?;
    let repo = KvRepository::new(conn);
    let mut people = repo.load_people(kind.key());
    let now = chrono::Utc::now();

    let mut extra = Map::new();
    extra.insert("nama".to_string(), Value::String(name.clone()));
    for (stored, alias) in kind.metadata_fields() {
        if let Some(v) =
            get_optional_str(params, stored).or_else(|| get_optional_str(params, alias))
        {
            extra.insert(stored.to_string(), Value::String(v));
        }
    }
    let (code_field, prefix) = kind.code_field();
    extra.insert(
        code_field.to_string(),
        Value::String(registry::sequence_code(prefix, people.len())),
    );
    extra.insert("createdAt".to_string(), Value::String(now.to_rfc3339()));

    let person = Person {
        id: registry::next_id(people.iter().map(|p| p.id), now)
            .ok_or_else(|| HandlerErr::ids_exhausted(kind.key()))?,
        name,
        extra,
    };
    people.push(person.clone());
    repo.save_people(kind.key(), &people)
        .map_err(|e| HandlerErr::write_failed(kind.key(), e))?;
    info!(kind = kind.key(), id = person.id, "registered");
    Ok(json!({ "person": person }))
}

fn people_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let kind = parse_kind(params)?;
    let id = get_required_i64(params, "id")?;
    let repo = KvRepository::new(conn);
    let mut people = repo.load_people(kind.key());
    let before = people.len();
    people.retain(|p| p.id != id);
    if people.len() == before {
        return Err(HandlerErr::not_found("person not found"));
    }
    repo.save_people(kind.key(), &people)
        .map_err(|e| HandlerErr::write_failed(kind.key(), e))?;
    Ok(json!({ "ok": true }))
}

fn handle_people_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match people_list(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_people_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match people_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_people_delete(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match people_delete(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "people.list" => Some(handle_people_list(state, req)),
        "people.create" => Some(handle_people_create(state, req)),
        "people.delete" => Some(handle_people_delete(state, req)),
        _ => None,
    }
}
