pub type Result<T> = std::result::Result<T, WeaveError>;

#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
    #[error("no {title} transport to peer: {reason}")]
    Unreachable { title: String, reason: String },

    #[error("invalid parameter: {0}")]
    InvalidParam(String),
}

impl WeaveError {
    /// Create an `Unreachable` error for the given selection criteria title,
    /// carrying the accumulated per-resource reason string.
    pub fn unreachable(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            title: title.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParam(msg.into())
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_display() {
        let e = WeaveError::unreachable("active messages", "rc/mlx5_0 - no sync callback");
        assert_eq!(
            e.to_string(),
            "no active messages transport to peer: rc/mlx5_0 - no sync callback"
        );
        assert!(e.is_unreachable());
    }

    #[test]
    fn test_invalid_param_display() {
        let e = WeaveError::invalid_param("too many resources");
        assert_eq!(e.to_string(), "invalid parameter: too many resources");
        assert!(!e.is_unreachable());
    }
}
