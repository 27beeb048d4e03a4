//! Example programs for memtally live under `examples/`.
