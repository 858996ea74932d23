use std::fmt;

use serde_json::{Map, Value};

use registrar_api::{Entrant, Registration};

/// Offending fields of a rejected registration, in the order checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing or invalid fields: {}", self.fields.join(", "))
    }
}

impl std::error::Error for ValidationError {}

/// Turn an untyped request body into a `Registration`.
///
/// Required: a non-blank `name` (or legacy `title`) and at least one
/// categorical field, `year` (integer 1..=9999) or `type` (non-blank
/// string). `roster`, if present and not null, must be an array of
/// `{id, name, weight, age}` entrants. All problems are reported at once.
pub fn registration(body: &Value) -> Result<Registration, ValidationError> {
    let Some(obj) = body.as_object() else {
        return Err(ValidationError { fields: vec!["body".into()] });
    };
    let mut bad: Vec<String> = Vec::new();

    let name = obj
        .get("name")
        .or_else(|| obj.get("title"))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty());
    if name.is_none() {
        bad.push("name".into());
    }

    let year = match present(obj, "year") {
        None => None,
        Some(v) => match v.as_i64().filter(|y| (1..=9999).contains(y)) {
            Some(y) => Some(y as i32),
            None => {
                bad.push("year".into());
                None
            }
        },
    };

    let kind = match present(obj, "type") {
        None => None,
        Some(v) => match v.as_str().filter(|s| !s.trim().is_empty()) {
            Some(s) => Some(s.to_string()),
            None => {
                bad.push("type".into());
                None
            }
        },
    };

    if year.is_none() && kind.is_none() && !bad.iter().any(|f| f == "year" || f == "type") {
        bad.push("year|type".into());
    }

    let roster = match present(obj, "roster") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| entrant(i, item, &mut bad))
            .collect(),
        Some(_) => {
            bad.push("roster".into());
            Vec::new()
        }
    };

    if !bad.is_empty() {
        return Err(ValidationError { fields: bad });
    }

    Ok(Registration {
        name: name.unwrap_or_default().to_string(),
        year,
        kind,
        roster,
    })
}

/// Field value unless absent or JSON null.
fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn entrant(index: usize, item: &Value, bad: &mut Vec<String>) -> Option<Entrant> {
    let Some(obj) = item.as_object() else {
        bad.push(format!("roster[{index}]"));
        return None;
    };
    let before = bad.len();

    let id = obj.get("id").and_then(Value::as_i64);
    if id.is_none() {
        bad.push(format!("roster[{index}].id"));
    }
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty());
    if name.is_none() {
        bad.push(format!("roster[{index}].name"));
    }
    let weight = obj.get("weight").and_then(Value::as_f64);
    if weight.is_none() {
        bad.push(format!("roster[{index}].weight"));
    }
    let age = obj
        .get("age")
        .and_then(Value::as_u64)
        .and_then(|a| u32::try_from(a).ok());
    if age.is_none() {
        bad.push(format!("roster[{index}].age"));
    }

    if bad.len() > before {
        return None;
    }
    Some(Entrant {
        id: id?,
        name: name?.to_string(),
        weight: weight?,
        age: age?,
    })
}
