use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::train::progress::DisplayMode;

/// Options for one `Trainer::train` run.
///
/// # Fields
/// - `num_epochs`   — number of full passes over the training data; `0`
///                    runs no epochs but still fires `train_begin`/`train_end`
/// - `verbose`      — show the progress reporter and log lines
/// - `device`       — `"auto"` or an explicit identifier such as `"cpu"`,
///                    `"cuda"`, `"cuda:1"`, `"mps"`
/// - `force_device` — fail when the explicit device is missing instead of
///                    falling back to `"auto"`
/// - `batch_size`   — samples per batch when raw datasets are given
/// - `shuffle`      — reshuffle raw datasets on every pass
/// - `display_mode` — how the progress reporter renders
/// - `seed`         — seed for reproducible shuffling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub num_epochs: usize,
    pub verbose: bool,
    pub device: String,
    pub force_device: bool,
    pub batch_size: usize,
    pub shuffle: bool,
    pub display_mode: DisplayMode,
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            num_epochs: 1,
            verbose: true,
            device: "auto".to_string(),
            force_device: true,
            batch_size: 16,
            shuffle: true,
            display_mode: DisplayMode::Auto,
            seed: None,
        }
    }
}

impl TrainConfig {
    /// Defaults for everything but the number of epochs.
    pub fn new(num_epochs: usize) -> Self {
        TrainConfig { num_epochs, ..TrainConfig::default() }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn force_device(mut self, force: bool) -> Self {
        self.force_device = force;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn display_mode(mut self, mode: DisplayMode) -> Self {
        self.display_mode = mode;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Deserializes a config from a JSON file. Missing fields take their
    /// defaults.
    pub fn load_json(path: &str) -> std::io::Result<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

/// Frozen facts about the current run, handed to every callback hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub num_epochs: usize,
    /// Training batches per epoch.
    pub num_batches: usize,
    /// Validation batches per epoch, when validation data was given.
    pub num_val_batches: Option<usize>,
    pub batch_size: usize,
    pub device: Device,
    pub verbose: bool,
    /// Already resolved: never `DisplayMode::Auto`.
    pub display_mode: DisplayMode,
}

impl RunConfig {
    pub fn has_validation(&self) -> bool {
        self.num_val_batches.is_some()
    }
}
