/*! Lowering tests against a recording backend. */

#![allow(unused_imports)]

mod lowering_tests;
mod memory_tests;
mod texture_tests;

use lanir_core::Shader;

use crate::{LowerConfig, Lowerer, Result};
use mock::MockBackend;

fn run_with(shader: &Shader, config: LowerConfig) -> (MockBackend, Result<()>) {
    let mut lowerer = Lowerer::with_config(MockBackend::default(), config);
    let result = lowerer.lower_shader(shader);
    (lowerer.into_backend(), result)
}

fn run(shader: &Shader) -> MockBackend {
    let (backend, result) = run_with(shader, LowerConfig::default());
    if let Err(err) = result {
        panic!("lowering failed: {}", err);
    }
    backend
}
