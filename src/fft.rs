//! Centred one dimensional FFTs.

use ndarray::ArrayViewMut1;
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{FftDirection, FftPlanner};
use unchecked_index::get_unchecked_mut;

/// performs a unitary 1D fft where the 0th component is at the center (len/2) rather than the start
/// removes the need for ifft_shift before and fft_shift after.
pub fn fftc(input: ArrayViewMut1<Complex<f64>>) {
    _fftc(input, FftDirection::Forward);
}

/// performs a unitary 1D ifft where the 0th component is at the center (len/2) rather than the start
/// removes the need for ifft_shift before and fft_shift after.
pub fn ifftc(input: ArrayViewMut1<Complex<f64>>) {
    _fftc(input, FftDirection::Inverse);
}

fn _fftc(mut input: ArrayViewMut1<Complex<f64>>, direction: FftDirection) {
    let n = input.len();
    if n == 0 {
        return;
    }
    let normalisation = 1.0 / (n as f64).sqrt();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft(n, direction);
    let mut buffer: Vec<Complex<f64>> = vec![Zero::zero(); n];
    let mut scratch: Vec<Complex<f64>> = vec![Zero::zero(); fft.get_inplace_scratch_len()];
    let half = n / 2;

    // construct input equivalent to ifft_shift, the upper half (from len/2) moves to the front
    unsafe {
        let mut k = 0;
        for &e in input.iter().skip(half) {
            *get_unchecked_mut(buffer.as_mut_slice(), k) = e;
            k += 1;
        }
        for &e in input.iter().take(half) {
            *get_unchecked_mut(buffer.as_mut_slice(), k) = e;
            k += 1;
        }
    }

    fft.process_with_scratch(&mut buffer, &mut scratch);

    // fft_shift and normalise while writing back
    unsafe {
        let mut k = 0;
        for e in input.iter_mut().skip(half) {
            *e = *get_unchecked_mut(buffer.as_mut_slice(), k) * normalisation;
            k += 1;
        }
        for e in input.iter_mut().take(half) {
            *e = *get_unchecked_mut(buffer.as_mut_slice(), k) * normalisation;
            k += 1;
        }
    }
}
