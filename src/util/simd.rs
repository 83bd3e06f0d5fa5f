//! SIMD kernels for the distance metrics, using the wide crate for vectorization.
//!
//! Every kernel processes 8 lanes at a time with `f32x8` and finishes the
//! remainder with scalar code. Callers are responsible for checking that both
//! operands have the same length.

use wide::f32x8;

#[inline]
fn load(chunk: &[f32]) -> f32x8 {
    let mut lanes = [0.0f32; 8];
    lanes.copy_from_slice(chunk);
    f32x8::new(lanes)
}

#[inline]
fn horizontal_sum(v: f32x8) -> f32 {
    v.to_array().iter().sum()
}

/// Squared Euclidean distance between two equally sized slices.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut acc = f32x8::splat(0.0);
    let a_chunks = a.chunks_exact(8);
    let b_chunks = b.chunks_exact(8);
    let a_rem = a_chunks.remainder();
    let b_rem = b_chunks.remainder();

    for (x, y) in a_chunks.zip(b_chunks) {
        let diff = load(x) - load(y);
        acc = acc + diff * diff;
    }

    let mut sum = horizontal_sum(acc);
    for (x, y) in a_rem.iter().zip(b_rem.iter()) {
        let d = x - y;
        sum += d * d;
    }
    sum
}

/// Dot product and both squared norms in a single pass, for cosine distance.
pub fn dot_and_norms(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    debug_assert_eq!(a.len(), b.len());

    let mut dot = f32x8::splat(0.0);
    let mut norm_a = f32x8::splat(0.0);
    let mut norm_b = f32x8::splat(0.0);
    let a_chunks = a.chunks_exact(8);
    let b_chunks = b.chunks_exact(8);
    let a_rem = a_chunks.remainder();
    let b_rem = b_chunks.remainder();

    for (x, y) in a_chunks.zip(b_chunks) {
        let va = load(x);
        let vb = load(y);
        dot = dot + va * vb;
        norm_a = norm_a + va * va;
        norm_b = norm_b + vb * vb;
    }

    let (mut d, mut na, mut nb) = (
        horizontal_sum(dot),
        horizontal_sum(norm_a),
        horizontal_sum(norm_b),
    );
    for (x, y) in a_rem.iter().zip(b_rem.iter()) {
        d += x * y;
        na += x * x;
        nb += y * y;
    }
    (d, na, nb)
}
