//! Portable compound filters.
//!
//! A [`FilterSet`] is a conjunction of [`Clause`]s that every store adapter translates to its
//! native query language. An empty set is never sent as a present-but-empty constraint: callers
//! pass `Option<&FilterSet>` obtained from [`FilterSet::sanitized`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::text::{FuzzyOptions, tokenize, tokens_match};

/// A single filter predicate over a dotted document path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Clause {
    Equals {
        path: String,
        value: Value,
    },
    Range {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gt: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gte: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lt: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lte: Option<f64>,
    },
    In {
        path: String,
        values: Vec<Value>,
    },
    Exists {
        path: String,
    },
    Not {
        clause: Box<Clause>,
    },
    /// Keyword match: any query token appears in the field.
    Text {
        path: String,
        query: String,
    },
}

impl Clause {
    pub fn equals(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Equals {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn gt(path: impl Into<String>, bound: f64) -> Self {
        Clause::Range {
            path: path.into(),
            gt: Some(bound),
            gte: None,
            lt: None,
            lte: None,
        }
    }

    pub fn range(
        path: impl Into<String>,
        gte: Option<f64>,
        lte: Option<f64>,
    ) -> Self {
        Clause::Range {
            path: path.into(),
            gt: None,
            gte,
            lt: None,
            lte,
        }
    }

    pub fn one_of<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Clause::In {
            path: path.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Clause::Exists { path: path.into() }
    }

    pub fn text(path: impl Into<String>, query: impl Into<String>) -> Self {
        Clause::Text {
            path: path.into(),
            query: query.into(),
        }
    }

    pub fn negate(self) -> Self {
        Clause::Not {
            clause: Box::new(self),
        }
    }

    /// Evaluates the clause against a JSON document.
    ///
    /// Array fields match if any element matches.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Clause::Equals { path, value } => {
                field_values(doc, path).iter().any(|v| json_eq(v, value))
            }
            Clause::Range {
                path,
                gt,
                gte,
                lt,
                lte,
            } => field_values(doc, path).iter().any(|v| {
                let Some(n) = v.as_f64() else {
                    return false;
                };
                gt.is_none_or(|b| n > b)
                    && gte.is_none_or(|b| n >= b)
                    && lt.is_none_or(|b| n < b)
                    && lte.is_none_or(|b| n <= b)
            }),
            Clause::In { path, values } => field_values(doc, path)
                .iter()
                .any(|v| values.iter().any(|candidate| json_eq(v, candidate))),
            Clause::Exists { path } => !field_values(doc, path).is_empty(),
            Clause::Not { clause } => !clause.matches(doc),
            Clause::Text { path, query } => {
                let query_tokens = tokenize(query);
                let field_tokens: Vec<String> = field_values(doc, path)
                    .iter()
                    .filter_map(|v| v.as_str())
                    .flat_map(tokenize)
                    .collect();
                query_tokens.iter().any(|q| {
                    field_tokens
                        .iter()
                        .any(|t| tokens_match(q, t, Some(FuzzyOptions::default())))
                })
            }
        }
    }
}

/// Conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    must: Vec<Clause>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, clause: Clause) -> Self {
        self.must.push(clause);
        self
    }

    pub fn push(&mut self, clause: Clause) {
        self.must.push(clause);
    }

    pub fn extend(&mut self, clauses: impl IntoIterator<Item = Clause>) {
        self.must.extend(clauses);
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.must
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    pub fn len(&self) -> usize {
        self.must.len()
    }

    /// `None` when there is nothing to constrain.
    pub fn sanitized(&self) -> Option<&FilterSet> {
        if self.is_empty() { None } else { Some(self) }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.must.iter().all(|c| c.matches(doc))
    }
}

impl FromIterator<Clause> for FilterSet {
    fn from_iter<T: IntoIterator<Item = Clause>>(iter: T) -> Self {
        Self {
            must: iter.into_iter().collect(),
        }
    }
}

/// Resolves a dotted path, flattening arrays. Nulls count as absent.
pub fn field_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(child) = item.get(segment) {
                            next.push(child);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }

    let mut out = Vec::new();
    for value in current {
        match value {
            Value::Null => {}
            Value::Array(items) => out.extend(items.iter().filter(|v| !v.is_null())),
            other => out.push(other),
        }
    }
    out
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
