use std::collections::BTreeMap;

use crate::error::{Result, TrainError};
use crate::tensor::Tensor;

/// One batch as yielded by a data source.
///
/// Batches are nested containers: the common case is a pair
/// `Seq([inputs, targets])`, but any mix of sequences, named fields, and
/// non-tensor leaves is allowed. Only `Tensor` leaves are moved between
/// devices.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Tensor(Tensor),
    Seq(Vec<Batch>),
    Map(BTreeMap<String, Batch>),
    Scalar(f64),
    Text(String),
}

impl Batch {
    /// The usual `(inputs, targets)` batch.
    pub fn pair(inputs: Tensor, targets: Tensor) -> Batch {
        Batch::Seq(vec![Batch::Tensor(inputs), Batch::Tensor(targets)])
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Batch::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Batch]> {
        match self {
            Batch::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Batch> {
        match self {
            Batch::Map(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Destructures a two-element batch whose elements are both tensors.
    pub fn input_target(&self) -> Result<(&Tensor, &Tensor)> {
        match self.as_seq() {
            Some([Batch::Tensor(x), Batch::Tensor(y)]) => Ok((x, y)),
            _ => Err(TrainError::contract(format!(
                "expected an (inputs, targets) tensor pair, got {}",
                self.describe()
            ))),
        }
    }

    /// Number of samples, taken from the first tensor leaf found.
    pub fn num_samples(&self) -> Option<usize> {
        match self {
            Batch::Tensor(t) => Some(t.rows),
            Batch::Seq(items) => items.iter().find_map(Batch::num_samples),
            Batch::Map(fields) => fields.values().find_map(Batch::num_samples),
            Batch::Scalar(_) | Batch::Text(_) => None,
        }
    }

    /// Short structural description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Batch::Tensor(t) => format!("tensor {}x{}", t.rows, t.cols),
            Batch::Seq(items) => {
                let inner: Vec<String> = items.iter().map(Batch::describe).collect();
                format!("[{}]", inner.join(", "))
            }
            Batch::Map(fields) => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.describe()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Batch::Scalar(_) => "scalar".to_string(),
            Batch::Text(_) => "text".to_string(),
        }
    }

    /// Collates single samples into one batch, position by position.
    ///
    /// Tensors are stacked row-wise, scalars become an `n x 1` tensor, text
    /// leaves are gathered into a sequence. All samples must share a shape.
    pub fn collate(samples: Vec<Batch>) -> Result<Batch> {
        let first = samples
            .first()
            .ok_or_else(|| TrainError::contract("cannot collate an empty list of samples"))?;

        match first {
            Batch::Tensor(_) => {
                let tensors = samples
                    .into_iter()
                    .map(|s| match s {
                        Batch::Tensor(t) => Ok(t),
                        other => Err(mismatch("tensor", &other)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Batch::Tensor(Tensor::stack_rows(&tensors)))
            }
            Batch::Scalar(_) => {
                let values = samples
                    .into_iter()
                    .map(|s| match s {
                        Batch::Scalar(v) => Ok(v),
                        other => Err(mismatch("scalar", &other)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Batch::Tensor(Tensor::from_vec(values.len(), 1, values)))
            }
            Batch::Text(_) => Ok(Batch::Seq(samples)),
            Batch::Seq(items) => {
                let width = items.len();
                let mut columns: Vec<Vec<Batch>> = vec![Vec::with_capacity(samples.len()); width];
                for sample in samples {
                    match sample {
                        Batch::Seq(items) if items.len() == width => {
                            for (column, item) in columns.iter_mut().zip(items) {
                                column.push(item);
                            }
                        }
                        other => return Err(mismatch(&format!("sequence of {width}"), &other)),
                    }
                }
                let collated = columns
                    .into_iter()
                    .map(Batch::collate)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Batch::Seq(collated))
            }
            Batch::Map(fields) => {
                let keys: Vec<String> = fields.keys().cloned().collect();
                let mut columns: BTreeMap<String, Vec<Batch>> =
                    keys.iter().map(|k| (k.clone(), Vec::new())).collect();
                for sample in samples {
                    match sample {
                        Batch::Map(fields) if fields.keys().eq(keys.iter()) => {
                            for (k, v) in fields {
                                if let Some(column) = columns.get_mut(&k) {
                                    column.push(v);
                                }
                            }
                        }
                        other => return Err(mismatch("map with matching keys", &other)),
                    }
                }
                let collated = columns
                    .into_iter()
                    .map(|(k, column)| Ok((k, Batch::collate(column)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?;
                Ok(Batch::Map(collated))
            }
        }
    }
}

fn mismatch(expected: &str, found: &Batch) -> TrainError {
    TrainError::contract(format!(
        "cannot collate samples of different shapes: expected {expected}, found {}",
        found.describe()
    ))
}

impl From<Tensor> for Batch {
    fn from(tensor: Tensor) -> Self {
        Batch::Tensor(tensor)
    }
}

impl From<f64> for Batch {
    fn from(value: f64) -> Self {
        Batch::Scalar(value)
    }
}

impl From<Vec<Batch>> for Batch {
    fn from(items: Vec<Batch>) -> Self {
        Batch::Seq(items)
    }
}

impl<A: Into<Batch>, B: Into<Batch>> From<(A, B)> for Batch {
    fn from((a, b): (A, B)) -> Self {
        Batch::Seq(vec![a.into(), b.into()])
    }
}
