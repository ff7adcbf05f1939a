//! Portable Contacts entries, response envelope and the filter engine.
//!
//! Only the `equals` operator is executed. The other operators of the
//! Portable Contacts protocol are recognized and refused, as is anything
//! unrecognized; a filter is never silently dropped.

use crate::error::{Error, Result};
use crate::params::{self, Params};
use crate::store::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEmail {
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ContactEmail {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: None,
        }
    }
}

/// One entry of a contact collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub emails: Vec<ContactEmail>,
}

impl From<&User> for Contact {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            display_name: user.display_name.clone(),
            emails: user.emails.iter().map(ContactEmail::new).collect(),
        }
    }
}

/// Body of a contact creation request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub display_name: String,
    #[serde(default)]
    pub emails: Vec<ContactEmail>,
}

/// Collection response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub start_index: usize,
    pub items_per_page: usize,
    pub total_results: usize,
    pub entry: T,
}

impl Envelope<Contact> {
    pub fn single(contact: Contact) -> Self {
        Self {
            start_index: 0,
            items_per_page: 1,
            total_results: 1,
            entry: contact,
        }
    }
}

impl Envelope<Vec<Contact>> {
    /// A window of `contacts` starting at `start_index`, at most `count` long.
    pub fn page(contacts: Vec<Contact>, start_index: usize, count: Option<usize>) -> Self {
        let total_results = contacts.len();
        let entry: Vec<Contact> = contacts
            .into_iter()
            .skip(start_index)
            .take(count.unwrap_or(usize::MAX))
            .collect();
        Self {
            start_index,
            items_per_page: entry.len(),
            total_results,
            entry,
        }
    }
}

/// Filter operators named by the Portable Contacts protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOp {
    Equals,
    Contains,
    StartWith,
    Present,
    Unrecognized(String),
}

impl FilterOp {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "equals" => FilterOp::Equals,
            "contains" => FilterOp::Contains,
            "startwith" => FilterOp::StartWith,
            "present" => FilterOp::Present,
            other => FilterOp::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FilterOp::Equals => "equals",
            FilterOp::Contains => "contains",
            FilterOp::StartWith => "startwith",
            FilterOp::Present => "present",
            FilterOp::Unrecognized(raw) => raw,
        }
    }
}

/// A single-field predicate: `filterBy`, `filterOp`, `filterValue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Dotted field path, e.g. `emails.value`
    pub by: String,
    pub op: FilterOp,
    pub value: Option<String>,
}

impl Filter {
    /// `None` when no filter parameter is given at all. A missing `filterOp` is
    /// treated as an unrecognized operator. An operator or value without
    /// `filterBy` is refused like the operator itself would be.
    pub fn from_params(params: &Params) -> Result<Option<Self>> {
        let op = params::get(params, "filterOp");
        let value = params::get(params, "filterValue");
        let Some(by) = params::get(params, "filterBy") else {
            return match op.map(FilterOp::parse) {
                None if value.is_none() => Ok(None),
                Some(FilterOp::Equals) => Err(Error::BadRequest(
                    "filterBy is required for equals".to_string(),
                )),
                other => {
                    let op = other.unwrap_or(FilterOp::Unrecognized(String::new()));
                    tracing::warn!("refusing filterOp {:?} without filterBy", op.as_str());
                    Err(Error::FilterNotImplemented(op.as_str().to_string()))
                }
            };
        };
        Ok(Some(Self {
            by: by.to_string(),
            op: FilterOp::parse(op.unwrap_or_default()),
            value: value.map(str::to_string),
        }))
    }

    /// Keep the contacts matching this filter.
    pub fn apply(&self, contacts: Vec<Contact>) -> Result<Vec<Contact>> {
        match self.op {
            FilterOp::Equals => {
                let expected = self.value.as_deref().ok_or_else(|| {
                    Error::BadRequest("filterValue is required for equals".to_string())
                })?;
                let path: Vec<&str> = self.by.split('.').collect();
                let mut kept = Vec::with_capacity(contacts.len());
                for contact in contacts {
                    let value = serde_json::to_value(&contact)?;
                    if field_equals(&value, &path, expected) {
                        kept.push(contact);
                    }
                }
                Ok(kept)
            }
            ref op => {
                tracing::warn!("refusing filterOp {:?} on {}", op.as_str(), self.by);
                Err(Error::FilterNotImplemented(op.as_str().to_string()))
            }
        }
    }
}

/// Paging parameters `startIndex` and `count`.
pub fn paging_from_params(params: &Params) -> Result<(usize, Option<usize>)> {
    let parse = |name: &str| -> Result<Option<usize>> {
        params::get(params, name)
            .map(|raw| {
                raw.parse::<usize>()
                    .map_err(|_| Error::BadRequest(format!("{} must be a non-negative integer", name)))
            })
            .transpose()
    };
    Ok((parse("startIndex")?.unwrap_or(0), parse("count")?))
}

/// Whether the value at `path` equals `expected`. Arrays anywhere along the
/// path match if any element does.
fn field_equals(value: &Value, path: &[&str], expected: &str) -> bool {
    if let Value::Array(items) = value {
        return items.iter().any(|item| field_equals(item, path, expected));
    }
    match path.split_first() {
        None => match value {
            Value::String(s) => s == expected,
            Value::Number(n) => n.to_string() == expected,
            Value::Bool(b) => b.to_string() == expected,
            _ => false,
        },
        Some((head, rest)) => match value {
            Value::Object(map) => map
                .get(*head)
                .is_some_and(|child| field_equals(child, rest, expected)),
            _ => false,
        },
    }
}
