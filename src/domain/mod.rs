// Domain layer: core models and ports (interfaces). No dependencies on the
// concrete HTTP adapter.

pub mod model;
pub mod ports;
