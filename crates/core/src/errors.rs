use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("session identity is missing; cart operations require a resolvable owner")]
    MissingSessionIdentity,
    #[error("tool result `{tool_call_id}` does not answer an open call of the latest assistant message")]
    UnmatchedToolCall { tool_call_id: String },
}

#[cfg(test)]
mod tests {
    use crate::errors::DomainError;

    #[test]
    fn unmatched_tool_call_names_the_offending_id() {
        let error = DomainError::UnmatchedToolCall { tool_call_id: "call_9".to_owned() };
        assert!(error.to_string().contains("call_9"));
    }
}
