//! Laplace-HDC codec (C2): fit/encode/decode/validate between the
//! geometric embedding space and the bipolar hypervector space.

mod laplace;

pub use laplace::{CodecError, LaplaceCodec, ValidationReport, DEFAULT_CORRELATION_THRESHOLD};
