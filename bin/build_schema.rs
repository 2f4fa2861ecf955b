//! Binary for generating contract schemas from odra modules.

#[allow(unused_imports)]
use coffer_contracts;

fn main() {
    // Schema generation is handled by the odra-build crate
}
