use super::{ApiError, ChannelError, ComposeError, ConfigError};

impl From<&'static str> for ApiError {
    fn from(message: &'static str) -> Self {
        ApiError::TestExpectation { message }
    }
}

impl From<String> for ApiError {
    fn from(value: String) -> Self {
        ApiError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for ChannelError {
    fn from(message: &'static str) -> Self {
        ChannelError::TestExpectation { message }
    }
}

impl From<String> for ChannelError {
    fn from(value: String) -> Self {
        ChannelError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for ComposeError {
    fn from(message: &'static str) -> Self {
        ComposeError::TestExpectation { message }
    }
}

impl From<String> for ComposeError {
    fn from(value: String) -> Self {
        ComposeError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for ConfigError {
    fn from(message: &'static str) -> Self {
        ConfigError::TestExpectation { message }
    }
}

impl From<String> for ConfigError {
    fn from(value: String) -> Self {
        ConfigError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}
