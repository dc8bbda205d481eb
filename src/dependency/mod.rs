mod graph;

pub use graph::DependencyGraph;
