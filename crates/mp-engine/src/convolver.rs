//! Uniformly partitioned FFT convolution (overlap-save).
//!
//! The impulse is cut into blocks of `block` samples, each transformed
//! once at construction. Input is gathered a block at a time; every full
//! block is transformed and pushed into a frequency-domain delay line,
//! which is multiplied against the impulse partitions and summed. Output
//! lags input by one block.

use alloc::vec;
use alloc::vec::Vec;

use crate::fft::{Complex, Fft};

/// Partition length used by the track reverb.
pub const BLOCK: usize = 512;

/// Mono convolver.
#[derive(Clone, Debug)]
pub struct Convolver {
    block: usize,
    fft: Fft,
    partitions: Vec<Vec<Complex>>,
    history: Vec<Vec<Complex>>,
    head: usize,
    window: Vec<f32>,
    output: Vec<f32>,
    pos: usize,
    spectrum: Vec<Complex>,
    accum: Vec<Complex>,
}

impl Convolver {
    pub fn new(impulse: &[f32], block: usize) -> Self {
        let block = block.max(1).next_power_of_two();
        let size = block * 2;
        let fft = Fft::new(size);
        let mut partitions: Vec<Vec<Complex>> = impulse
            .chunks(block)
            .map(|chunk| {
                let mut bins = vec![Complex::ZERO; size];
                for (bin, &x) in bins.iter_mut().zip(chunk) {
                    bin.re = x;
                }
                fft.forward(&mut bins);
                bins
            })
            .collect();
        if partitions.is_empty() {
            partitions.push(vec![Complex::ZERO; size]);
        }
        let count = partitions.len();
        Self {
            block,
            fft,
            partitions,
            history: vec![vec![Complex::ZERO; size]; count],
            head: 0,
            window: vec![0.0; size],
            output: vec![0.0; block],
            pos: 0,
            spectrum: vec![Complex::ZERO; size],
            accum: vec![Complex::ZERO; size],
        }
    }

    /// Output latency in samples.
    pub fn latency(&self) -> usize {
        self.block
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.output[self.pos];
        self.window[self.block + self.pos] = x;
        self.pos += 1;
        if self.pos == self.block {
            self.run_block();
            self.pos = 0;
        }
        y
    }

    /// Forget all buffered input and pending output.
    pub fn reset(&mut self) {
        for spectrum in &mut self.history {
            spectrum.fill(Complex::ZERO);
        }
        self.window.fill(0.0);
        self.output.fill(0.0);
        self.pos = 0;
        self.head = 0;
    }

    fn run_block(&mut self) {
        let count = self.partitions.len();
        for (bin, &x) in self.spectrum.iter_mut().zip(&self.window) {
            *bin = Complex::new(x, 0.0);
        }
        self.fft.forward(&mut self.spectrum);

        self.head = (self.head + count - 1) % count;
        self.history[self.head].copy_from_slice(&self.spectrum);

        self.accum.fill(Complex::ZERO);
        for (p, partition) in self.partitions.iter().enumerate() {
            let past = &self.history[(self.head + p) % count];
            for ((acc, &x), &h) in self.accum.iter_mut().zip(past).zip(partition) {
                acc.mul_add(x, h);
            }
        }
        self.fft.inverse(&mut self.accum);
        for (out, bin) in self.output.iter_mut().zip(&self.accum[self.block..]) {
            *out = bin.re;
        }
        self.window.copy_within(self.block.., 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(conv: &mut Convolver, input: &[f32]) -> Vec<f32> {
        input.iter().map(|&x| conv.process(x)).collect()
    }

    #[test]
    fn unit_impulse_delays_by_one_block() {
        let mut conv = Convolver::new(&[1.0], 8);
        let mut input = vec![0.0; 32];
        input[3] = 1.0;
        let out = run(&mut conv, &input);
        for (i, y) in out.iter().enumerate() {
            let expected = if i == 3 + 8 { 1.0 } else { 0.0 };
            assert!((y - expected).abs() < 1e-5, "sample {i}: {y}");
        }
    }

    #[test]
    fn matches_direct_convolution_across_partitions() {
        let impulse: Vec<f32> = (0..20).map(|i| 1.0 / (i as f32 + 1.0)).collect();
        let input: Vec<f32> = (0..64).map(|i| if i % 7 == 0 { 1.0 } else { -0.25 }).collect();
        let block = 4;
        let mut conv = Convolver::new(&impulse, block);
        let out = run(&mut conv, &input);
        for n in block..input.len() {
            let t = n - block;
            let direct: f32 = (0..impulse.len())
                .filter(|&k| k <= t)
                .map(|k| impulse[k] * input[t - k])
                .sum();
            assert!((out[n] - direct).abs() < 1e-3, "n={n}: {} vs {}", out[n], direct);
        }
    }

    #[test]
    fn reset_clears_tail() {
        let mut conv = Convolver::new(&[1.0, 1.0, 1.0, 1.0], 4);
        run(&mut conv, &[1.0; 6]);
        conv.reset();
        let out = run(&mut conv, &[0.0; 16]);
        assert!(out.iter().all(|y| y.abs() < 1e-6));
    }

    #[test]
    fn empty_impulse_is_silent() {
        let mut conv = Convolver::new(&[], 4);
        let out = run(&mut conv, &[1.0; 16]);
        assert!(out.iter().all(|y| *y == 0.0));
    }
}
