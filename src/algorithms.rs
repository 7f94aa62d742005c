pub mod dijkstra;

pub use dijkstra::{ShortestPath, all_pairs_costs, shortest_paths_from};
