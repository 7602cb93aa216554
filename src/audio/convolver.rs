//! Uniformly partitioned FFT convolution for the reverb.
//!
//! The impulse is cut into `PARTITION`-sized blocks and every block is
//! transformed once on the control side ([`ConvolutionKernel::new`]), so the
//! audio thread only ever does one forward FFT, a spectral multiply-accumulate
//! over the history, and one inverse FFT per block.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use super::effect::Effect;
use super::frame::StereoFrame;

/// Block size of the partitioned convolution; also the reverb's added latency.
pub const PARTITION: usize = 256;
const FFT_SIZE: usize = PARTITION * 2;
const BINS: usize = FFT_SIZE / 2 + 1;

/// A decaying noise burst, one vec per channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ImpulseResponse {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl ImpulseResponse {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Pre-transformed partitions of an [`ImpulseResponse`].
pub struct ConvolutionKernel {
    partitions: [Vec<Vec<Complex<f32>>>; 2],
}

impl ConvolutionKernel {
    pub fn new(ir: &ImpulseResponse) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(FFT_SIZE);
        Self {
            partitions: [
                transform_partitions(&ir.left, r2c.as_ref()),
                transform_partitions(&ir.right, r2c.as_ref()),
            ],
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions[0].len()
    }
}

/// Zeroed spectra history for one kernel, one ring per channel.
#[derive(Clone)]
pub struct ConvolutionHistory {
    spectra: [Vec<Vec<Complex<f32>>>; 2],
}

impl ConvolutionHistory {
    fn for_kernel(kernel: &ConvolutionKernel) -> Self {
        let count = kernel.partition_count().max(1);
        let ring = vec![vec![Complex::new(0.0, 0.0); BINS]; count];
        Self { spectra: [ring.clone(), ring] }
    }

    fn len(&self) -> usize {
        self.spectra[0].len()
    }
}

/// A kernel together with the history it needs. Built on the control side so
/// swapping it into a running [`Convolver`] allocates nothing.
#[derive(Clone)]
pub struct PreparedKernel {
    pub kernel: Arc<ConvolutionKernel>,
    history: ConvolutionHistory,
}

impl PreparedKernel {
    pub fn new(kernel: Arc<ConvolutionKernel>) -> Self {
        let history = ConvolutionHistory::for_kernel(&kernel);
        Self { kernel, history }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl std::fmt::Debug for PreparedKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedKernel")
            .field("partitions", &self.kernel.partition_count())
            .field("history", &self.history.len())
            .finish()
    }
}

impl std::fmt::Debug for ConvolutionKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvolutionKernel")
            .field("partitions", &self.partition_count())
            .finish()
    }
}

fn transform_partitions(channel: &[f32], r2c: &dyn RealToComplex<f32>) -> Vec<Vec<Complex<f32>>> {
    channel
        .chunks(PARTITION)
        .map(|chunk| {
            // zero padded to FFT_SIZE; the first half holds the taps
            let mut input = vec![0.0f32; FFT_SIZE];
            input[..chunk.len()].copy_from_slice(chunk);
            let mut spectrum = r2c.make_output_vec();
            if r2c.process(&mut input, &mut spectrum).is_err() {
                spectrum.fill(Complex::new(0.0, 0.0));
            }
            spectrum
        })
        .collect()
}

/// Convolution reverb: dry plus `wet_level` times the convolved signal.
pub struct Convolver {
    kernel: Arc<ConvolutionKernel>,
    wet_level: f32,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    // per channel: last two input blocks (overlap-save window)
    window: [Vec<f32>; 2],
    // per channel ring of past input spectra, newest at `head`
    history: ConvolutionHistory,
    head: usize,
    // per channel wet output of the last processed block
    wet: [Vec<f32>; 2],
    pos: usize, // position inside the current block
    scratch_in: Vec<f32>,
    scratch_spec: Vec<Complex<f32>>,
    acc: Vec<Complex<f32>>,
    scratch_out: Vec<f32>,
}

impl Convolver {
    pub fn new(kernel: Arc<ConvolutionKernel>, wet_level: f32) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(FFT_SIZE);
        let c2r = planner.plan_fft_inverse(FFT_SIZE);
        let history = ConvolutionHistory::for_kernel(&kernel);
        Self {
            kernel,
            wet_level,
            r2c,
            c2r,
            window: [vec![0.0; FFT_SIZE], vec![0.0; FFT_SIZE]],
            history,
            head: 0,
            wet: [vec![0.0; PARTITION], vec![0.0; PARTITION]],
            pos: 0,
            scratch_in: vec![0.0; FFT_SIZE],
            scratch_spec: vec![Complex::new(0.0, 0.0); BINS],
            acc: vec![Complex::new(0.0, 0.0); BINS],
            scratch_out: vec![0.0; FFT_SIZE],
        }
    }

    /// Swap in a new kernel and hand back the old one with its history, so
    /// the caller decides where they get freed.
    pub fn set_kernel(&mut self, prepared: PreparedKernel) -> PreparedKernel {
        let PreparedKernel { kernel, history } = prepared;
        let old = PreparedKernel {
            kernel: std::mem::replace(&mut self.kernel, kernel),
            history: std::mem::replace(&mut self.history, history),
        };
        self.head = 0;
        old
    }

    pub fn set_wet_level(&mut self, wet_level: f32) {
        self.wet_level = wet_level;
    }

    // runs once per PARTITION input frames
    fn process_block(&mut self) {
        let count = self.history.len();
        self.head = (self.head + 1) % count;

        for ch in 0..2 {
            self.scratch_in.copy_from_slice(&self.window[ch]);
            if self.r2c.process(&mut self.scratch_in, &mut self.scratch_spec).is_err() {
                self.scratch_spec.fill(Complex::new(0.0, 0.0));
            }
            self.history.spectra[ch][self.head].copy_from_slice(&self.scratch_spec);

            self.acc.fill(Complex::new(0.0, 0.0));
            let partitions = &self.kernel.partitions[ch];
            for (p, h) in partitions.iter().enumerate() {
                let x = &self.history.spectra[ch][(self.head + count - p % count) % count];
                for ((a, xv), hv) in self.acc.iter_mut().zip(x.iter()).zip(h.iter()) {
                    *a += xv * hv;
                }
            }
            // real signals only, the edge bins carry no imaginary part
            self.acc[0].im = 0.0;
            self.acc[BINS - 1].im = 0.0;

            if self.c2r.process(&mut self.acc, &mut self.scratch_out).is_err() {
                self.scratch_out.fill(0.0);
            }
            // overlap-save keeps the second half, realfft leaves it unnormalized
            let norm = 1.0 / FFT_SIZE as f32;
            for (w, s) in self.wet[ch].iter_mut().zip(&self.scratch_out[PARTITION..]) {
                *w = s * norm;
            }

            // slide the window: current block becomes the previous one
            self.window[ch].copy_within(PARTITION.., 0);
        }
    }
}

impl Effect for Convolver {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            self.window[0][PARTITION + self.pos] = f.left;
            self.window[1][PARTITION + self.pos] = f.right;
            let wet = StereoFrame { left: self.wet[0][self.pos], right: self.wet[1][self.pos] };
            f.add_scaled(wet, self.wet_level);

            self.pos += 1;
            if self.pos == PARTITION {
                self.pos = 0;
                self.process_block();
            }
        }
    }

    fn reset(&mut self) {
        for ch in 0..2 {
            self.window[ch].fill(0.0);
            self.wet[ch].fill(0.0);
            for spec in self.history.spectra[ch].iter_mut() {
                spec.fill(Complex::new(0.0, 0.0));
            }
        }
        self.pos = 0;
    }
}
