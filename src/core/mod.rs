pub mod binary_matrix;
pub mod connections;
pub mod potential_pool;
pub mod segment;
pub mod spatial_pooler;
pub mod temporal_memory;
pub mod topology;
