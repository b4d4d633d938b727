pub mod destination;
pub mod normalize;
