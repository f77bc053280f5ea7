//! Bipolar hyperdimensional vector algebra.
//!
//! `bind`, `bundle`, `unbind` and `negate` operate on vectors whose
//! components are drawn from {-1, +1} (a "hypervector"). These are the
//! primitives the HRC stage of the reasoning pipeline (`crate::reasoning`)
//! composes into `general_search` / `recipe_search` / `analogy` queries.

/// A bipolar hypervector: every component is exactly -1 or +1.
pub type Hypervector = Vec<i8>;

/// Element-wise product of two bipolar vectors.
///
/// Self-inverse on {-1, +1}: `bind(bind(x, y), y) == x` (law L1 in the spec).
///
/// # Panics
/// Panics if `a` and `b` have different lengths.
pub fn bind(a: &[i8], b: &[i8]) -> Hypervector {
    assert_eq!(a.len(), b.len(), "bind: dimension mismatch");
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).collect()
}

/// `unbind` is `bind` under element-wise product over {-1, +1}.
pub fn unbind(a: &[i8], b: &[i8]) -> Hypervector {
    bind(a, b)
}

/// Element-wise sign flip.
pub fn negate(a: &[i8]) -> Hypervector {
    a.iter().map(|&x| -x).collect()
}

/// Element-wise majority vote over a set of bipolar vectors (ties resolve to
/// `+1`, the spec's chosen deterministic tie-break). Associative and
/// commutative: the result does not depend on the enumeration order of
/// `vectors` (property P9).
///
/// # Panics
/// Panics if `vectors` is empty, or its members have differing lengths.
pub fn bundle(vectors: &[&[i8]]) -> Hypervector {
    assert!(!vectors.is_empty(), "bundle: no vectors to bundle");
    let dim = vectors[0].len();
    for v in vectors {
        assert_eq!(v.len(), dim, "bundle: dimension mismatch");
    }

    (0..dim)
        .map(|i| {
            let sum: i64 = vectors.iter().map(|v| v[i] as i64).sum();
            if sum >= 0 {
                1
            } else {
                -1
            }
        })
        .collect()
}

/// Sign with the spec's deterministic tie-break: exact zero resolves to +1.
pub fn sign_tie_positive(x: f64) -> i8 {
    if x >= 0.0 {
        1
    } else {
        -1
    }
}

/// Assert every component of `v` lies in {-1, +1} (property P1, invariant I4).
pub fn is_bipolar(v: &[i8]) -> bool {
    v.iter().all(|&x| x == 1 || x == -1)
}
