pub type VloedResult<T> = Result<T, VloedError>;

#[derive(thiserror::Error, Debug)]
pub enum VloedError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("malformed packet ({len} bytes): {reason}")]
    MalformedPacket { len: usize, reason: &'static str },

    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("display sink error: {0}")]
    Sink(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VloedError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn malformed(len: usize, reason: &'static str) -> Self {
        Self::MalformedPacket { len, reason }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// `true` for errors that only cost one datagram and must never stop the server.
    pub fn is_packet_local(&self) -> bool {
        matches!(self, Self::MalformedPacket { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            VloedError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            VloedError::malformed(1, "short header")
                .to_string()
                .contains("malformed packet (1 bytes): short header")
        );
        assert!(
            VloedError::sink("x")
                .to_string()
                .contains("display sink error:")
        );
    }

    #[test]
    fn io_errors_become_network_errors() {
        let err: VloedError = std::io::Error::other("boom").into();
        assert!(matches!(err, VloedError::Network(_)));
        assert!(err.to_string().contains("boom"));
        assert!(!err.is_packet_local());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VloedError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
