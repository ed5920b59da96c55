use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

/// Flat metric-name to value mapping, as produced by one batch or one epoch.
pub type Metrics = BTreeMap<String, f64>;

/// Per-metric record of values, one entry appended per `update`.
///
/// The trainer appends one entry per epoch, so `history["loss"][i]` is the
/// mean training loss of epoch `i + 1`. Keys only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    stats: BTreeMap<String, Vec<f64>>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    /// Appends one value per key, creating keys on first sight. Values of any
    /// numeric type convertible to `f64` are accepted.
    pub fn update<I, K, V>(&mut self, metrics: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<f64>,
    {
        for (key, value) in metrics {
            self.stats.entry(key.into()).or_default().push(value.into());
        }
    }

    /// Every value recorded under `key`, in append order.
    pub fn get(&self, key: &str) -> Result<&[f64]> {
        self.stats
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| TrainError::KeyNotFound(key.to_string()))
    }

    /// Arithmetic mean of every value recorded under `key`.
    pub fn average_of(&self, key: &str) -> Result<f64> {
        mean(key, self.get(key)?)
    }

    /// Mean of every key.
    pub fn average(&self) -> Result<Metrics> {
        self.stats
            .iter()
            .map(|(key, values)| Ok((key.clone(), mean(key, values)?)))
            .collect()
    }

    /// Most recent value of every key.
    pub fn last(&self) -> Metrics {
        self.stats
            .iter()
            .filter_map(|(key, values)| values.last().map(|v| (key.clone(), *v)))
            .collect()
    }

    /// `(epoch_number, value)` pairs for `key`, 1-based, ready for plotting.
    pub fn series(&self, key: &str) -> Result<Vec<(usize, f64)>> {
        Ok(self
            .get(key)?
            .iter()
            .enumerate()
            .map(|(i, v)| (i + 1, *v))
            .collect())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.stats.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.stats.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.stats.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<History> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the history as a JSON object of metric name to value array.
    /// A `.json` extension is appended when `path` lacks one.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = with_json_extension(path.as_ref());
        let file = std::fs::File::create(&path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(path)
    }

    /// Reads a history written by [`History::save_json`].
    pub fn load_json(path: impl AsRef<Path>) -> Result<History> {
        let file = std::fs::File::open(with_json_extension(path.as_ref()))?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl std::ops::Index<&str> for History {
    type Output = [f64];

    /// # Panics
    /// Panics on an unknown key; use [`History::get`] to handle that case.
    fn index(&self, key: &str) -> &Self::Output {
        match self.stats.get(key) {
            Some(values) => values.as_slice(),
            None => panic!("Key not found: {key}"),
        }
    }
}

impl From<BTreeMap<String, Vec<f64>>> for History {
    fn from(stats: BTreeMap<String, Vec<f64>>) -> Self {
        History { stats }
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = (&'a String, &'a Vec<f64>);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Vec<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.stats.iter()
    }
}

fn mean(key: &str, values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(TrainError::contract(format!("no values recorded for {key}")));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

fn with_json_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == "json" => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".json");
            PathBuf::from(name)
        }
    }
}
