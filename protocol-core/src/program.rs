//! Loading a declared protocol from its on-disk (YAML) definition: the
//! boundary a host crosses before handing a [`crate::ast::Protocol`] to
//! whatever compiles it into an op-tree.

use crate::ast::{self, Protocol};
use crate::error::CoreError;

/// Parses and validates a protocol definition. Fails with
/// [`CoreError::ProgramFormat`] on malformed YAML, or
/// [`CoreError::InvalidProtocol`] if parsing succeeds but the declared state
/// graph doesn't hold together (see [`ast::validate`]).
pub fn load_protocol(source: &str) -> Result<Protocol, CoreError> {
    let protocol: Protocol = serde_yaml::from_str(source)?;
    let errors = ast::validate(&protocol);
    if !errors.is_empty() {
        return Err(CoreError::InvalidProtocol(errors));
    }
    Ok(protocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_well_formed_protocol() {
        let yaml = r#"
initial_state: Open
messages:
  - name: Close
    when: Open
    then: Closed
    agent: Client
    data: []
    parts: []
"#;
        let protocol = load_protocol(yaml).expect("should parse and validate");
        assert_eq!(protocol.initial_state, "Open");
        assert_eq!(protocol.messages.len(), 1);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = load_protocol("not: [valid, protocol").unwrap_err();
        assert!(matches!(err, CoreError::ProgramFormat(_)));
    }

    #[test]
    fn rejects_structurally_invalid_protocol() {
        let yaml = r#"
initial_state: Open
messages:
  - name: Ping
    when: Isolated
    then: Isolated
    agent: Server
    data: []
    parts: []
"#;
        let err = load_protocol(yaml).unwrap_err();
        assert!(matches!(err, CoreError::InvalidProtocol(_)));
    }
}
