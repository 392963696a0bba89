//! Per-column label encoding with an explicit unknown bucket

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Sentinel category that absorbs values unseen at fit time
pub const UNKNOWN: &str = "<UNK>";

/// Label encoder for one categorical column
///
/// Codes are indices into the sorted training vocabulary; `<UNK>` sits right
/// after it, so its code equals the vocabulary size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    column: String,
    classes: Vec<String>,
    is_fitted: bool,
}

impl LabelEncoder {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit on the training values; nulls and the sentinel itself are not
    /// part of the vocabulary.
    pub fn fit(&mut self, values: &[Option<String>]) -> Result<&mut Self> {
        let vocabulary: BTreeSet<&str> = values
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|v| *v != UNKNOWN)
            .collect();

        self.classes = vocabulary.into_iter().map(str::to_string).collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Code for one value; anything outside the vocabulary gets the unknown code
    pub fn encode(&self, value: Option<&str>) -> usize {
        value
            .and_then(|v| self.classes.binary_search_by(|c| c.as_str().cmp(v)).ok())
            .unwrap_or_else(|| self.unknown_code())
    }

    pub fn transform(&self, values: &[Option<String>]) -> Result<Vec<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        Ok(values
            .iter()
            .map(|v| self.encode(v.as_deref()) as f64)
            .collect())
    }

    pub fn fit_transform(&mut self, values: &[Option<String>]) -> Result<Vec<f64>> {
        self.fit(values)?;
        self.transform(values)
    }

    pub fn unknown_code(&self) -> usize {
        self.classes.len()
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// File name the encoder is persisted under, `encoder_<column>.json`
    pub fn file_name(&self) -> String {
        format!("encoder_{}.json", self.column)
    }

    /// Persist into `dir`, returning the written path
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[Option<&str>]) -> Vec<Option<String>> {
        items.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_sorted_codes() {
        let mut enc = LabelEncoder::new("chest_pain");
        let codes = enc
            .fit_transform(&values(&[Some("typical"), Some("atypical"), Some("typical")]))
            .unwrap();
        assert_eq!(enc.classes(), &["atypical".to_string(), "typical".to_string()]);
        assert_eq!(codes, vec![1.0, 0.0, 1.0]);
        assert_eq!(enc.unknown_code(), 2);
    }

    #[test]
    fn test_unseen_values_share_unknown_code() {
        let mut enc = LabelEncoder::new("c");
        enc.fit(&values(&[Some("a"), Some("b")])).unwrap();
        let codes = enc
            .transform(&values(&[Some("z"), Some("a"), None, Some("y"), Some(UNKNOWN)]))
            .unwrap();
        assert_eq!(codes, vec![2.0, 0.0, 2.0, 2.0, 2.0]);
        assert_eq!(enc.unknown_code(), 2);
    }

    #[test]
    fn test_transform_before_fit() {
        let enc = LabelEncoder::new("c");
        assert!(matches!(
            enc.transform(&values(&[Some("a")])),
            Err(PipelineError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut enc = LabelEncoder::new("thal");
        enc.fit(&values(&[Some("fixed"), Some("normal")])).unwrap();

        let path = enc.save(dir.path()).unwrap();
        assert!(path.ends_with("encoder_thal.json"));

        let loaded = LabelEncoder::load(&path).unwrap();
        assert_eq!(loaded, enc);
        assert_eq!(loaded.encode(Some("reversible")), 2);
    }
}
