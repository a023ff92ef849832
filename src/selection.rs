use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use toml;
use tracing::debug;

use crate::error::TaskError;

/// Which asset keys to copy: every surviving asset, or an explicit list.
///
/// Decoded once from the raw option value, which is either the literal
/// wildcard token ("all", case-insensitive) or a list of asset keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpec", into = "RawSpec")]
pub enum SelectionSpec {
    All,
    Explicit(Vec<String>),
}

#[derive(Deserialize, Serialize, Clone)]
#[serde(untagged)]
enum RawSpec {
    Token(String),
    Keys(Vec<String>),
}

impl TryFrom<RawSpec> for SelectionSpec {
    type Error = TaskError;

    fn try_from(raw: RawSpec) -> Result<Self, Self::Error> {
        match raw {
            RawSpec::Token(token) if token.eq_ignore_ascii_case("all") => Ok(SelectionSpec::All),
            RawSpec::Token(token) => Err(TaskError::Config(format!(
                "assets must be the wildcard token \"all\" or a list of asset keys, got \"{}\"",
                token
            ))),
            RawSpec::Keys(keys) => Ok(SelectionSpec::Explicit(keys)),
        }
    }
}

impl From<SelectionSpec> for RawSpec {
    fn from(spec: SelectionSpec) -> Self {
        match spec {
            SelectionSpec::All => RawSpec::Token("all".to_string()),
            SelectionSpec::Explicit(keys) => RawSpec::Keys(keys),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionOptions {
    pub assets: SelectionSpec,
    #[serde(default)]
    pub drop_assets: Vec<String>,
}

impl SelectionOptions {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let options: Self = toml::from_str(&content)?;
        Ok(options)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Disjoint split of an item's asset keys after selection.
#[derive(Debug, PartialEq)]
pub struct Partition {
    pub copied: BTreeSet<String>,
    pub kept: BTreeSet<String>,
}

/// Splits `original_keys` into the keys to copy and the keys to keep as-is.
///
/// `drop_assets` is applied first, unconditionally, so the wildcard only
/// expands over the survivors. Keys named in either option but absent from
/// `original_keys` are ignored rather than treated as errors.
pub fn partition(original_keys: &BTreeSet<String>, options: &SelectionOptions) -> Partition {
    let survivors: BTreeSet<String> = original_keys
        .iter()
        .filter(|key| !options.drop_assets.contains(*key))
        .cloned()
        .collect();
    for key in original_keys.difference(&survivors) {
        debug!("Dropping asset {}", key);
    }

    let copied: BTreeSet<String> = match &options.assets {
        SelectionSpec::All => survivors.clone(),
        SelectionSpec::Explicit(keys) => keys
            .iter()
            .filter(|key| survivors.contains(*key))
            .cloned()
            .collect(),
    };
    let kept: BTreeSet<String> = survivors.difference(&copied).cloned().collect();

    Partition { copied, kept }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OPTIONS_PATH: &str = "/tmp/copy_assets_options.toml";

    fn keys(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn options(assets: SelectionSpec, drop_assets: &[&str]) -> SelectionOptions {
        SelectionOptions {
            assets,
            drop_assets: drop_assets.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_all_copies_everything() {
        let partition = partition(
            &keys(&["image", "thumbnail"]),
            &options(SelectionSpec::All, &[]),
        );
        assert_eq!(partition.copied, keys(&["image", "thumbnail"]));
        assert_eq!(partition.kept, BTreeSet::new());
    }

    #[test]
    fn test_explicit_list_splits_copy_and_keep() {
        let partition = partition(
            &keys(&["image", "thumbnail"]),
            &options(SelectionSpec::Explicit(vec!["image".to_string()]), &[]),
        );
        assert_eq!(partition.copied, keys(&["image"]));
        assert_eq!(partition.kept, keys(&["thumbnail"]));
    }

    #[test]
    fn test_drop_applied_before_wildcard() {
        let partition = partition(
            &keys(&["image", "thumbnail"]),
            &options(SelectionSpec::All, &["image"]),
        );
        assert_eq!(partition.copied, keys(&["thumbnail"]));
        assert_eq!(partition.kept, BTreeSet::new());
    }

    #[test]
    fn test_drop_everything() {
        let partition = partition(
            &keys(&["image", "thumbnail"]),
            &options(SelectionSpec::All, &["image", "thumbnail"]),
        );
        assert_eq!(partition.copied, BTreeSet::new());
        assert_eq!(partition.kept, BTreeSet::new());
    }

    #[test]
    fn test_invalid_keys_are_ignored() {
        let partition = partition(
            &keys(&["image", "thumbnail"]),
            &options(
                SelectionSpec::Explicit(vec!["invalid-key".to_string()]),
                &["another-invalid-key"],
            ),
        );
        assert_eq!(partition.copied, BTreeSet::new());
        assert_eq!(partition.kept, keys(&["image", "thumbnail"]));
    }

    #[test]
    fn test_empty_item() {
        let partition = partition(&BTreeSet::new(), &options(SelectionSpec::All, &[]));
        assert_eq!(partition.copied, BTreeSet::new());
        assert_eq!(partition.kept, BTreeSet::new());
    }

    #[test]
    fn test_empty_explicit_list_keeps_everything() {
        let partition = partition(
            &keys(&["image", "thumbnail"]),
            &options(SelectionSpec::Explicit(vec![]), &[]),
        );
        assert_eq!(partition.copied, BTreeSet::new());
        assert_eq!(partition.kept, keys(&["image", "thumbnail"]));
    }

    #[test]
    fn test_partition_invariant() {
        let original = keys(&["a", "b", "c", "d"]);
        let opts = options(
            SelectionSpec::Explicit(vec!["a".to_string(), "c".to_string(), "zz".to_string()]),
            &["b"],
        );
        let partition = partition(&original, &opts);
        assert!(partition.copied.is_disjoint(&partition.kept));
        let union: BTreeSet<String> = partition
            .copied
            .union(&partition.kept)
            .cloned()
            .collect();
        assert_eq!(union, keys(&["a", "c", "d"]));
    }

    #[test]
    fn test_wildcard_is_case_insensitive() {
        let spec: SelectionSpec = serde_json::from_value(json!("ALL")).unwrap();
        assert_eq!(spec, SelectionSpec::All);
        let spec: SelectionSpec = serde_json::from_value(json!("all")).unwrap();
        assert_eq!(spec, SelectionSpec::All);
    }

    #[test]
    fn test_unrecognized_token_is_an_error() {
        let result: Result<SelectionSpec, _> = serde_json::from_value(json!("some"));
        assert!(result.is_err());
    }

    #[test]
    fn test_options_from_json() {
        let options: SelectionOptions =
            serde_json::from_value(json!({"assets": ["image"], "drop_assets": ["thumbnail"]}))
                .unwrap();
        assert_eq!(
            options.assets,
            SelectionSpec::Explicit(vec!["image".to_string()])
        );
        assert_eq!(options.drop_assets, vec!["thumbnail".to_string()]);
    }

    #[test]
    fn test_drop_assets_defaults_to_empty() {
        let options: SelectionOptions = serde_json::from_value(json!({"assets": "all"})).unwrap();
        assert_eq!(options.assets, SelectionSpec::All);
        assert!(options.drop_assets.is_empty());
    }

    #[test]
    fn test_read_write_toml() {
        let path = Path::new(OPTIONS_PATH);
        let options = options(SelectionSpec::Explicit(vec!["image".to_string()]), &["qa"]);
        options.write(path).unwrap();

        let options = SelectionOptions::read(path).unwrap();
        assert_eq!(
            options.assets,
            SelectionSpec::Explicit(vec!["image".to_string()])
        );
        assert_eq!(options.drop_assets, vec!["qa".to_string()]);
    }

    #[test]
    fn test_read_write_toml_wildcard() {
        let path = Path::new("/tmp/copy_assets_options_all.toml");
        let options = options(SelectionSpec::All, &[]);
        options.write(path).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("assets = \"all\""));

        let options = SelectionOptions::read(path).unwrap();
        assert_eq!(options.assets, SelectionSpec::All);
    }
}
