mod compare;

pub use compare::compare_versions;
