use super::domain::EscrowEvent;

/// Outbound hook for the system that actually moves money.
pub trait PaymentGateway: Send + Sync {
    /// Hands over every event produced by one ledger change. The batch is accepted or
    /// rejected as a whole; a rejected batch must leave nothing applied downstream.
    fn publish(&self, events: &[EscrowEvent]) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway rejected the event: {0}")]
    Rejected(String),
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}
