/// Errors that can occur in tracker operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// An order asked for more units than the records show on hand.
    #[error("insufficient stock for product {product} (have {have}, need {need})")]
    InsufficientStock { product: u64, have: u64, need: u64 },

    /// The purchase side-effect of an order could not be issued.
    #[error("world client error: {0}")]
    World(#[from] worldlink_world::WorldError),
}

pub type Result<T> = std::result::Result<T, TrackError>;
