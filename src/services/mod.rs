pub mod anomaly;
pub mod astronomy;
pub mod ground_truth;
pub mod normalizer;
pub mod reconcile;
pub mod sensor;
pub mod sink;
