use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::*;

// The label-selector string grammar, e.g. `app=foo,tier!=debug,env in (prod,staging),!canary`.
// The meanings of the four operators are explained here:
// https://kubernetes.io/docs/concepts/overview/working-with-objects/labels/#set-based-requirement
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    pub values: Vec<String>,
}

// An empty selector (zero requirements) matches every object, same as the upstream parser's
// handling of the empty string.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selector {
    requirements: Vec<SelectorRequirement>,
}

err_impl! {SelectorError,
    #[error("unparsable label selector requirement: {0:?}")]
    BadRequirement(String),

    #[error("label selector values may not be empty: {0:?}")]
    EmptyValues(String),

    #[error("invalid label key: {0:?}")]
    BadKey(String),
}

impl Selector {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|req| req.matches(labels))
    }

    pub fn requirements(&self) -> &[SelectorRequirement] {
        &self.requirements
    }
}

impl SelectorRequirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self.operator {
            SelectorOperator::In => match labels.get(&self.key) {
                Some(v) => self.values.contains(v),
                None => false,
            },

            // An absent key satisfies NotIn; `tier!=debug` matches pods with no tier label at all
            SelectorOperator::NotIn => match labels.get(&self.key) {
                Some(v) => !self.values.contains(v),
                None => true,
            },

            SelectorOperator::Exists => labels.contains_key(&self.key),
            SelectorOperator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }
}

impl FromStr for Selector {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> anyhow::Result<Selector> {
        let mut requirements = vec![];
        for part in split_requirements(input) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            requirements.push(parse_requirement(part)?);
        }
        Ok(Selector { requirements })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl fmt::Display for SelectorRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            SelectorOperator::In if self.values.len() == 1 => write!(f, "{}={}", self.key, self.values[0]),
            SelectorOperator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            SelectorOperator::NotIn if self.values.len() == 1 => write!(f, "{}!={}", self.key, self.values[0]),
            SelectorOperator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
            SelectorOperator::Exists => write!(f, "{}", self.key),
            SelectorOperator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

// Requirements are comma-separated, but the value sets of `in`/`notin` contain commas too, so we
// can't just split on ','; track paren depth instead.
fn split_requirements(input: &str) -> Vec<&str> {
    let mut parts = vec![];
    let mut depth = 0;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            },
            _ => (),
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_requirement(part: &str) -> anyhow::Result<SelectorRequirement> {
    if let Some(rest) = part.strip_prefix('!') {
        let key = validate_key(rest.trim())?;
        return Ok(SelectorRequirement {
            key,
            operator: SelectorOperator::DoesNotExist,
            values: vec![],
        });
    }

    if let Some((key, values)) = split_set_expr(part, " notin ") {
        return build_set_requirement(part, key, SelectorOperator::NotIn, values);
    }
    if let Some((key, values)) = split_set_expr(part, " in ") {
        return build_set_requirement(part, key, SelectorOperator::In, values);
    }

    if let Some((key, value)) = part.split_once("!=") {
        return Ok(SelectorRequirement {
            key: validate_key(key.trim())?,
            operator: SelectorOperator::NotIn,
            values: vec![value.trim().into()],
        });
    }

    // `==` and `=` are synonyms; check the two-character form first so we don't leave a stray
    // `=` on the front of the value
    if let Some((key, value)) = part.split_once("==").or_else(|| part.split_once('=')) {
        return Ok(SelectorRequirement {
            key: validate_key(key.trim())?,
            operator: SelectorOperator::In,
            values: vec![value.trim().into()],
        });
    }

    // What's left can only be a bare existence check; anything else (e.g. `env in prod` with the
    // parens missing) is a syntax error
    let Ok(key) = validate_key(part) else {
        bail!(SelectorError::bad_requirement(part));
    };
    Ok(SelectorRequirement { key, operator: SelectorOperator::Exists, values: vec![] })
}

fn split_set_expr<'a>(part: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let (key, rest) = part.split_once(op)?;
    let values = rest.trim().strip_prefix('(')?.strip_suffix(')')?;
    Some((key, values))
}

fn build_set_requirement(
    part: &str,
    key: &str,
    operator: SelectorOperator,
    values: &str,
) -> anyhow::Result<SelectorRequirement> {
    let values: Vec<String> = values
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        bail!(SelectorError::empty_values(part));
    }
    Ok(SelectorRequirement { key: validate_key(key.trim())?, operator, values })
}

fn validate_key(key: &str) -> anyhow::Result<String> {
    if key.is_empty() || key.chars().any(|ch| "!=,()".contains(ch) || ch.is_whitespace()) {
        bail!(SelectorError::bad_key(key));
    }
    Ok(key.into())
}
