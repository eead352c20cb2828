pub mod descriptions;
pub mod lifecycle;
pub mod numbering;
pub mod transitions;
