//! Test parameters and parametrization.
//!
//! A [`Parametrize`] lists named options, each with the values it can take.
//! Its [`combinations`](Parametrize::combinations) are the cartesian product
//! of the options, and the registry derives one test per combination.

use std::fmt;

use benchlink_core::error::{Error, Result};

/// One parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// The parameter assignment a test runs with, in option order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an earlier value of the same name.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn required(&self, name: &str) -> Result<&ParamValue> {
        self.get(name)
            .ok_or_else(|| Error::Configuration(format!("missing parameter '{name}'")))
    }

    fn wrong_type(name: &str, wanted: &str, got: &ParamValue) -> Error {
        Error::Configuration(format!(
            "parameter '{name}' is not {wanted} (value {got})"
        ))
    }

    /// An integer parameter.
    pub fn int(&self, name: &str) -> Result<i64> {
        match self.required(name)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(Self::wrong_type(name, "an integer", other)),
        }
    }

    /// A boolean parameter.
    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.required(name)? {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(Self::wrong_type(name, "a boolean", other)),
        }
    }

    /// A string parameter.
    pub fn str(&self, name: &str) -> Result<&str> {
        match self.required(name)? {
            ParamValue::Str(v) => Ok(v),
            other => Err(Self::wrong_type(name, "a string", other)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// `a=1/b=2`
impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ParamOption {
    names: Vec<String>,
    rows: Vec<Vec<ParamValue>>,
}

/// Named options whose cartesian product parametrizes a test.
#[derive(Debug, Clone, Default)]
pub struct Parametrize {
    options: Vec<ParamOption>,
}

impl Parametrize {
    pub fn new() -> Self {
        Self::default()
    }

    /// One option taking each of `values` in turn.
    pub fn option<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.options.push(ParamOption {
            names: vec![name.to_string()],
            rows: values.into_iter().map(|v| vec![v.into()]).collect(),
        });
        self
    }

    /// Several options varying together: every row assigns one value to
    /// each name. A row of the wrong length is a configuration error.
    pub fn option_group<N, R>(mut self, names: N, rows: R) -> Result<Self>
    where
        N: IntoIterator,
        N::Item: Into<String>,
        R: IntoIterator<Item = Vec<ParamValue>>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::Configuration("option group without names".into()));
        }
        let rows: Vec<Vec<ParamValue>> = rows.into_iter().collect();
        if let Some(bad) = rows.iter().find(|r| r.len() != names.len()) {
            return Err(Error::Configuration(format!(
                "option group {names:?} expects {} values per row, got {}",
                names.len(),
                bad.len()
            )));
        }
        self.options.push(ParamOption { names, rows });
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Every combination, first option varying slowest.
    pub fn combinations(&self) -> Vec<Params> {
        let mut out = vec![Params::new()];
        for option in &self.options {
            let mut next = Vec::with_capacity(out.len() * option.rows.len());
            for base in &out {
                for row in &option.rows {
                    let mut params = base.clone();
                    for (name, value) in option.names.iter().zip(row) {
                        params.set(name, value.clone());
                    }
                    next.push(params);
                }
            }
            out = next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_product_last_fastest() {
        let p = Parametrize::new()
            .option("a", [1, 2])
            .option("b", [true, false]);
        let names: Vec<String> = p.combinations().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["a=1/b=true", "a=1/b=false", "a=2/b=true", "a=2/b=false"]);
    }

    #[test]
    fn grouped_options_vary_together() {
        let p = Parametrize::new()
            .option_group(
                ["x", "y"],
                [
                    vec![ParamValue::from(1), ParamValue::from("lo")],
                    vec![ParamValue::from(2), ParamValue::from("hi")],
                ],
            )
            .unwrap()
            .option("z", [0]);
        let combos = p.combinations();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[1].int("x").unwrap(), 2);
        assert_eq!(combos[1].str("y").unwrap(), "hi");
        assert_eq!(combos[1].int("z").unwrap(), 0);
    }

    #[test]
    fn ragged_group_rejected() {
        let result = Parametrize::new().option_group(["x", "y"], [vec![ParamValue::from(1)]]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn empty_option_yields_nothing() {
        let p = Parametrize::new().option("a", Vec::<i64>::new());
        assert!(p.combinations().is_empty());
        assert_eq!(Parametrize::new().combinations(), vec![Params::new()]);
    }

    #[test]
    fn typed_access() {
        let params = Params::new().with("n", 3).with("fast", true).with("mode", "spi");
        assert_eq!(params.int("n").unwrap(), 3);
        assert!(params.bool("fast").unwrap());
        assert_eq!(params.str("mode").unwrap(), "spi");
        assert!(matches!(params.int("mode"), Err(Error::Configuration(_))));
        assert!(matches!(params.bool("missing"), Err(Error::Configuration(_))));
        assert_eq!(params.len(), 3);
    }
}
