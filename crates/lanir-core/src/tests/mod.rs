/*! Test coverage for the IR model.
 *
 * Slot counting and opcode metadata feed directly into lowering arithmetic, so they are
 * pinned down here alongside the builder's numbering and scoping behavior.
 */

#![allow(unused_imports)]

mod builder_tests;
