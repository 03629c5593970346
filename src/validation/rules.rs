use serde_json::{Map, Value};

/// A structural check over one payload entry.
///
/// Rules append `field: message` strings instead of stopping at the first
/// problem so the validation report lists everything wrong with an entry.
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, entry: &Map<String, Value>, errors: &mut Vec<String>);
}

pub struct RequiredFieldsRule;

impl ValidationRule for RequiredFieldsRule {
    fn name(&self) -> &'static str {
        "RequiredFields"
    }

    fn check(&self, entry: &Map<String, Value>, errors: &mut Vec<String>) {
        for field in ["name", "description", "homepage"] {
            match entry.get(field) {
                None | Some(Value::Null) => errors.push(format!("{}: Field required", field)),
                Some(Value::String(s)) if s.trim().is_empty() => {
                    errors.push(format!("{}: must not be empty", field))
                }
                Some(Value::String(_)) => {}
                Some(_) => errors.push(format!("{}: Input should be a valid string", field)),
            }
        }
    }
}

pub struct BiotoolsIdRule;

impl ValidationRule for BiotoolsIdRule {
    fn name(&self) -> &'static str {
        "BiotoolsId"
    }

    fn check(&self, entry: &Map<String, Value>, errors: &mut Vec<String>) {
        match entry.get("biotoolsID") {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(_) => errors.push("biotoolsID: Input should be a valid string".to_string()),
        }
    }
}

/// EDAM topic annotations: `[{term, uri}]`.
pub struct TopicRule;

impl ValidationRule for TopicRule {
    fn name(&self) -> &'static str {
        "Topic"
    }

    fn check(&self, entry: &Map<String, Value>, errors: &mut Vec<String>) {
        for_each_object(entry, "topic", errors, |index, topic, errors| {
            if !topic.contains_key("term") && !topic.contains_key("uri") {
                errors.push(format!("topic.{}: needs a term or uri", index));
            }
            for key in ["term", "uri"] {
                optional_string(topic, key, &format!("topic.{}.{}", index, key), errors);
            }
        });
    }
}

pub struct FunctionRule;

impl ValidationRule for FunctionRule {
    fn name(&self) -> &'static str {
        "Function"
    }

    fn check(&self, entry: &Map<String, Value>, errors: &mut Vec<String>) {
        for_each_object(entry, "function", errors, |index, function, errors| {
            for key in ["operation", "input", "output"] {
                match function.get(key) {
                    None | Some(Value::Null) | Some(Value::Array(_)) => {}
                    Some(_) => errors.push(format!("function.{}.{}: Input should be a valid list", index, key)),
                }
            }
        });
    }
}

/// `link` and `documentation`: `[{url, type?}]` with `type` a string or list.
pub struct LinkRule {
    field: &'static str,
}

impl LinkRule {
    pub fn new(field: &'static str) -> Self {
        Self { field }
    }
}

impl ValidationRule for LinkRule {
    fn name(&self) -> &'static str {
        "Link"
    }

    fn check(&self, entry: &Map<String, Value>, errors: &mut Vec<String>) {
        let field = self.field;
        for_each_object(entry, field, errors, |index, link, errors| {
            match link.get("url") {
                Some(Value::String(url)) if !url.trim().is_empty() => {}
                Some(Value::String(_)) => errors.push(format!("{}.{}.url: must not be empty", field, index)),
                None | Some(Value::Null) => errors.push(format!("{}.{}.url: Field required", field, index)),
                Some(_) => errors.push(format!("{}.{}.url: Input should be a valid string", field, index)),
            }
            match link.get("type") {
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(Value::Array(types)) if types.iter().all(Value::is_string) => {}
                Some(_) => errors.push(format!(
                    "{}.{}.type: Input should be a string or list of strings",
                    field, index
                )),
            }
        });
    }
}

pub struct PublicationRule;

impl ValidationRule for PublicationRule {
    fn name(&self) -> &'static str {
        "Publication"
    }

    fn check(&self, entry: &Map<String, Value>, errors: &mut Vec<String>) {
        for_each_object(entry, "publication", errors, |index, publication, errors| {
            for key in ["pmid", "pmcid", "doi"] {
                optional_string(publication, key, &format!("publication.{}.{}", index, key), errors);
            }
        });
    }
}

fn for_each_object<F>(entry: &Map<String, Value>, field: &str, errors: &mut Vec<String>, mut check: F)
where
    F: FnMut(usize, &Map<String, Value>, &mut Vec<String>),
{
    match entry.get(field) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                match item.as_object() {
                    Some(object) => check(index, object, errors),
                    None => errors.push(format!("{}.{}: Input should be an object", field, index)),
                }
            }
        }
        Some(_) => errors.push(format!("{}: Input should be a valid list", field)),
    }
}

fn optional_string(object: &Map<String, Value>, key: &str, path: &str, errors: &mut Vec<String>) {
    match object.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(_) => errors.push(format!("{}: Input should be a valid string", path)),
    }
}
