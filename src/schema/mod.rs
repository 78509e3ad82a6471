pub mod classify;
pub mod infer;
