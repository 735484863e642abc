pub mod context;
pub mod doctor;
pub mod graph;
pub mod runtime;
pub mod serve;
pub mod sync;
pub mod train;
