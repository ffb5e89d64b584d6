//! Wire types shared by the purchase gateway and its collaborators.

pub mod types;

pub use types::{
    BonusAck, BonusRecord, BonusRequest, FlightQuote, HealthResponse, PointsSummary,
    SellRequest, SellResponse, TransactionId,
};
