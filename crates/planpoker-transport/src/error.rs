/// Errors raised by a transport or one of its connections.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listener failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting or upgrading an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The transport was shut down and accepts nothing further.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns `true` if this error means the peer is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::SendFailed(_) | Self::ReceiveFailed(_) | Self::Shutdown
        )
    }
}
