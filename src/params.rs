use std::fmt::Display;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::error::{FemkitError, Result};

/// Parameters loaded from a YAML document.
///
/// No schema is enforced: sections such as `io`, `num`, `mesh` and `phys`
/// are a convention between the parameter file and the code reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    root: Mapping,
}

impl ParameterSet {
    pub fn from_mapping(root: Mapping) -> ParameterSet {
        ParameterSet { root }
    }

    pub fn from_yaml_str(contents: &str, origin: &Path) -> Result<ParameterSet> {
        let value: Value = serde_yaml::from_str(contents)
            .map_err(|err| FemkitError::parse(origin, err.to_string()))?;
        match value {
            Value::Mapping(root) => Ok(ParameterSet { root }),
            other => Err(FemkitError::parse(
                origin,
                format!("expected a mapping at the top level, found {}", kind_name(&other)),
            )),
        }
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn contains(&self, section: &str) -> bool {
        self.root.contains_key(section)
    }

    pub fn get(&self, section: &str) -> Option<&Value> {
        self.root.get(section)
    }

    /// Looks up a `/`-separated path such as `io/results`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let mut value = self.root.get(parts.next()?)?;
        for part in parts {
            value = value.get(part)?;
        }
        Some(value)
    }

    /// Deserializes one section into a typed struct.
    pub fn section<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .lookup(name)
            .ok_or_else(|| FemkitError::MissingParameter(name.to_string()))?;
        serde_yaml::from_value(value.clone()).map_err(|err| FemkitError::Parse {
            file: format!("<parameters:{name}>").into(),
            message: err.to_string(),
        })
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "an empty document",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

impl Display for ParameterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dumped = serde_yaml::to_string(&self.root).map_err(|_| std::fmt::Error)?;
        write!(f, "{dumped}")
    }
}

/// Reads a YAML parameter file.
pub fn load_parameters(path: impl AsRef<Path>) -> Result<ParameterSet> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(FemkitError::FileNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    ParameterSet::from_yaml_str(&contents, path)
}

/// YAML rendering of the parameters, e.g. for debug logs.
pub fn dump_parameters(params: &ParameterSet) -> Result<String> {
    Ok(serde_yaml::to_string(params.root())?)
}

pub fn print_parameters(params: &ParameterSet) {
    println!("{params}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    const SAMPLE: &str = "
io:
  results: out/run1
num:
  dt: 0.01
  steps: 100
mesh:
  a: 1.0
";

    #[derive(Debug, Deserialize, PartialEq)]
    struct Num {
        dt: f64,
        steps: usize,
    }

    #[test]
    fn sections_and_paths_resolve() {
        let params = ParameterSet::from_yaml_str(SAMPLE, Path::new("sample.yaml")).unwrap();
        assert!(params.contains("io"));
        assert!(!params.contains("phys"));
        assert_eq!(
            params.lookup("io/results").and_then(|v| v.as_str()),
            Some("out/run1")
        );
        let num: Num = params.section("num").unwrap();
        assert_eq!(num, Num { dt: 0.01, steps: 100 });
    }

    #[test]
    fn missing_section_is_reported_by_name() {
        let params = ParameterSet::from_yaml_str(SAMPLE, Path::new("sample.yaml")).unwrap();
        let err = params.section::<Num>("phys").unwrap_err();
        assert!(matches!(err, FemkitError::MissingParameter(name) if name == "phys"));
    }

    #[test]
    fn non_mapping_documents_are_parse_errors() {
        for doc in ["", "- 1\n- 2\n", "just text"] {
            let err = ParameterSet::from_yaml_str(doc, Path::new("bad.yaml")).unwrap_err();
            assert!(matches!(err, FemkitError::Parse { .. }), "{doc:?}");
        }
        let err = ParameterSet::from_yaml_str("io: [unclosed", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, FemkitError::Parse { .. }));
    }

    #[test]
    fn dump_is_reloadable() {
        let params = ParameterSet::from_yaml_str(SAMPLE, Path::new("sample.yaml")).unwrap();
        let dumped = dump_parameters(&params).unwrap();
        let again = ParameterSet::from_yaml_str(&dumped, Path::new("dumped.yaml")).unwrap();
        assert_eq!(again, params);
        assert_eq!(params.to_string(), dumped);
    }
}
