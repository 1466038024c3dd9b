// Generation cache for skill graphs.
// One generative call per profile, ever, unless explicitly regenerated;
// concurrent first requests for the same profile share a single flight.

pub mod flight;
pub mod generator;
pub mod handlers;
