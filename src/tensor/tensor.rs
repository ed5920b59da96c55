use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

use crate::device::Device;

/// Row-major 2-D tensor of `f64`, tagged with the device it lives on.
///
/// A batch of samples is one row per sample. Host memory backs every device
/// in this reference backend, so relocating a tensor only retags it; mixing
/// tensors from different devices in one operation is still rejected, just as
/// a real accelerator backend would.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub rows: usize,
    pub cols: usize,
    data: Vec<f64>,
    #[serde(default)]
    device: Device,
}

impl Tensor {
    pub fn zeros(rows: usize, cols: usize) -> Tensor {
        Tensor::full(rows, cols, 0.0)
    }

    pub fn ones(rows: usize, cols: usize) -> Tensor {
        Tensor::full(rows, cols, 1.0)
    }

    pub fn full(rows: usize, cols: usize, value: f64) -> Tensor {
        Tensor {
            rows,
            cols,
            data: vec![value; rows * cols],
            device: Device::Cpu,
        }
    }

    /// Zero tensor with the same shape and device as `other`.
    pub fn zeros_like(other: &Tensor) -> Tensor {
        Tensor::zeros(other.rows, other.cols).to(&other.device)
    }

    /// Builds a tensor from flat row-major data.
    ///
    /// # Panics
    /// Panics if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Tensor {
        assert_eq!(data.len(), rows * cols, "data length does not match shape {rows}x{cols}");
        Tensor { rows, cols, data, device: Device::Cpu }
    }

    /// Builds a tensor from nested rows.
    ///
    /// # Panics
    /// Panics if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Tensor {
        let n = rows.len();
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(n * cols);
        for row in rows {
            assert_eq!(row.len(), cols, "ragged rows");
            data.extend(row);
        }
        Tensor::from_vec(n, cols, data)
    }

    /// Single-element tensor.
    pub fn scalar(value: f64) -> Tensor {
        Tensor::from_vec(1, 1, vec![value])
    }

    /// Uniform samples in [-1, 1).
    pub fn random(rows: usize, cols: usize) -> Tensor {
        let mut rng = rand::thread_rng();
        let data = (0..rows * cols).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect();
        Tensor::from_vec(rows, cols, data)
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Uniform on (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal(rows: usize, cols: usize, std_dev: f64) -> Tensor {
        let mut rng = rand::thread_rng();
        let data = (0..rows * cols)
            .map(|_| Tensor::sample_standard_normal(&mut rng) * std_dev)
            .collect();
        Tensor::from_vec(rows, cols, data)
    }

    /// He initialization, N(0, sqrt(2 / rows)). `rows` is the fan-in of a
    /// weight matrix shaped (inputs, outputs). Use before ReLU layers.
    pub fn he(rows: usize, cols: usize) -> Tensor {
        Tensor::normal(rows, cols, (2.0 / rows.max(1) as f64).sqrt())
    }

    /// Xavier (Glorot) initialization, N(0, sqrt(1 / rows)). Use before
    /// Sigmoid/Tanh/Identity layers.
    pub fn xavier(rows: usize, cols: usize) -> Tensor {
        Tensor::normal(rows, cols, (1.0 / rows.max(1) as f64).sqrt())
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Returns this tensor relocated to `device`.
    pub fn to(mut self, device: &Device) -> Tensor {
        self.device = *device;
        self
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }

    /// Stacks row-tensors on top of each other.
    ///
    /// # Panics
    /// Panics on an empty slice or if column counts or devices differ.
    pub fn stack_rows(parts: &[Tensor]) -> Tensor {
        assert!(!parts.is_empty(), "stack_rows needs at least one tensor");
        let first = &parts[0];
        let mut data = Vec::with_capacity(parts.iter().map(Tensor::len).sum());
        let mut rows = 0;
        for part in parts {
            assert_eq!(part.cols, first.cols, "cannot stack tensors with different widths");
            assert_eq!(part.device, first.device, "cannot stack tensors on different devices");
            data.extend_from_slice(&part.data);
            rows += part.rows;
        }
        Tensor::from_vec(rows, first.cols, data).to(&first.device)
    }

    pub fn transpose(&self) -> Tensor {
        let mut res = Tensor::zeros(self.cols, self.rows).to(&self.device);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        res
    }

    pub fn map<F>(&self, functor: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
            device: self.device,
        }
    }

    /// Applies `functor` to each row independently.
    pub fn map_rows<F>(&self, functor: F) -> Tensor
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let mut data = Vec::with_capacity(self.data.len());
        for r in 0..self.rows {
            let out = functor(self.row(r));
            assert_eq!(out.len(), self.cols, "map_rows must preserve row width");
            data.extend(out);
        }
        Tensor { rows: self.rows, cols: self.cols, data, device: self.device }
    }

    pub fn scale(&self, factor: f64) -> Tensor {
        self.map(|x| x * factor)
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Mean over all elements; NaN for an empty tensor.
    pub fn mean(&self) -> f64 {
        self.sum() / self.data.len() as f64
    }

    /// Column-wise sum, producing a 1 x cols tensor.
    pub fn sum_rows(&self) -> Tensor {
        let mut res = Tensor::zeros(1, self.cols).to(&self.device);
        for r in 0..self.rows {
            for (acc, x) in res.data.iter_mut().zip(self.row(r)) {
                *acc += x;
            }
        }
        res
    }

    /// Index of the maximum element in each row.
    pub fn argmax_rows(&self) -> Vec<usize> {
        (0..self.rows)
            .map(|r| {
                self.row(r)
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Adds a 1 x cols row to every row of `self`.
    pub fn add_row(&self, row: &Tensor) -> Tensor {
        assert_eq!(row.rows, 1, "add_row expects a single row");
        assert_eq!(row.cols, self.cols, "Tensors are of incorrect sizes");
        self.check_device(row);
        let mut res = self.clone();
        for r in 0..self.rows {
            for (x, b) in res.data[r * self.cols..(r + 1) * self.cols].iter_mut().zip(&row.data) {
                *x += b;
            }
        }
        res
    }

    pub fn matmul(&self, rhs: &Tensor) -> Tensor {
        if self.cols != rhs.rows {
            panic!("Tensors are of incorrect sizes")
        }
        self.check_device(rhs);

        let mut res = Tensor::zeros(self.rows, rhs.cols).to(&self.device);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                for j in 0..rhs.cols {
                    res.data[i * rhs.cols + j] += a * rhs.data[k * rhs.cols + j];
                }
            }
        }
        res
    }

    fn zip_with<F>(&self, other: &Tensor, functor: F) -> Tensor
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.rows != other.rows || self.cols != other.cols {
            panic!("Tensors are of incorrect sizes")
        }
        self.check_device(other);
        Tensor {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| functor(a, b)).collect(),
            device: self.device,
        }
    }

    fn check_device(&self, other: &Tensor) {
        if self.device != other.device {
            panic!(
                "Tensors live on different devices ({} vs {})",
                self.device, other.device
            )
        }
    }
}

impl Default for Tensor {
    fn default() -> Self {
        Tensor::zeros(0, 0)
    }
}

impl Add for &Tensor {
    type Output = Tensor;

    fn add(self, rhs: Self) -> Self::Output {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for &Tensor {
    type Output = Tensor;

    fn sub(self, rhs: Self) -> Self::Output {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul for &Tensor {
    type Output = Tensor;

    fn mul(self, rhs: Self) -> Self::Output {
        self.matmul(rhs)
    }
}
