use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Unnormalised DCT-II of a fixed length, computed through a 2N-point FFT of
/// the mirrored signal.
///
/// `X[k] = sum_n x[n] * cos(pi / N * (n + 0.5) * k)`
pub struct Dct2 {
    n: usize,
    fft: Arc<dyn Fft<f64>>,
    twiddles: Vec<Complex<f64>>,
}

impl Dct2 {
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(2 * n);
        let twiddles = (0..n)
            .map(|k| Complex::from_polar(0.5, -PI * k as f64 / (2 * n) as f64))
            .collect();
        Self { n, fft, twiddles }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Transforms `input` (length N) into `output` (length N).
    pub fn transform(&self, input: &[f64], output: &mut [f64]) {
        debug_assert_eq!(input.len(), self.n);
        debug_assert_eq!(output.len(), self.n);

        let mut buf: Vec<Complex<f64>> = input
            .iter()
            .chain(input.iter().rev())
            .map(|&v| Complex::new(v, 0.0))
            .collect();
        self.fft.process(&mut buf);

        for (k, out) in output.iter_mut().enumerate() {
            *out = (buf[k] * self.twiddles[k]).re;
        }
    }

    /// In-place separable 2-D transform of a row-major N x N block.
    pub fn transform_2d(&self, block: &mut [f64]) {
        let n = self.n;
        debug_assert_eq!(block.len(), n * n);

        let mut line = vec![0.0f64; n];
        let mut out = vec![0.0f64; n];

        for row in block.chunks_exact_mut(n) {
            line.copy_from_slice(row);
            self.transform(&line, &mut out);
            row.copy_from_slice(&out);
        }

        for col in 0..n {
            for (r, v) in line.iter_mut().enumerate() {
                *v = block[r * n + col];
            }
            self.transform(&line, &mut out);
            for (r, v) in out.iter().enumerate() {
                block[r * n + col] = *v;
            }
        }
    }
}
