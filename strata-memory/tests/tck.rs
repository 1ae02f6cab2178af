use strata_core::Consistency;
use strata_memory::MemoryProvider;

mod acid {
    use super::*;

    strata_tck::conformance_tests!(async { MemoryProvider::new() });
}

mod base {
    use super::*;

    strata_tck::conformance_tests!(async { MemoryProvider::with_consistency(Consistency::Base) });
}
