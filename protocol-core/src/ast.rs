//! The analyzed protocol AST: the boundary between a DSL front end (out of
//! scope here) and the op-tree this crate executes. Messages are already
//! resolved to states, agents, typed fields, and a wire-layout script.

use std::collections::BTreeSet;
use std::fmt;

use petgraph::graph::DiGraph;
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Agent {
    Client,
    Server,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sizing {
    Fixed(u32),
    Dynamic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    Int {
        encoding: String,
        unsigned: bool,
        bits: u32,
    },
    Str {
        encoding: String,
        sizing: Sizing,
        max_length: Option<u32>,
    },
    Array {
        element: Box<FieldType>,
        sizing: Sizing,
        max_length: Option<u32>,
    },
    Tuple {
        fields: Vec<(String, FieldType)>,
    },
    Stream,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Token {
    Field(String),
    Literal(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Part {
    Tokens(Vec<Token>),
    Terminator(Vec<u8>),
    ForEach {
        loop_var: String,
        collection_field: String,
        body: Vec<Part>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub name: String,
    pub when: String,
    pub then: String,
    pub agent: Agent,
    /// Declaration order matters for wire layout, so this is a `Vec`, not a map.
    pub data: Vec<(String, FieldType)>,
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Protocol {
    pub initial_state: String,
    pub messages: Vec<Message>,
}

/// A structural problem found by `validate`, named the way a reviewer would
/// point at the offending message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidateError {
    pub message_name: Option<String>,
    pub detail: String,
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message_name {
            Some(name) => write!(f, "{name}: {}", self.detail),
            None => write!(f, "{}", self.detail),
        }
    }
}

/// Shallow structural checks: a guard against authoring mistakes, not a full
/// semantic analysis pass. Checks every `ForEach` loop variable refers to a
/// declared array field, and that every state is reachable from the
/// protocol's initial state.
pub fn validate(protocol: &Protocol) -> Vec<ValidateError> {
    let mut errors = Vec::new();

    for message in &protocol.messages {
        check_for_each_targets(message, &mut errors);
    }

    check_state_reachability(protocol, &mut errors);

    errors
}

fn check_for_each_targets(message: &Message, errors: &mut Vec<ValidateError>) {
    fn walk(message_name: &str, parts: &[Part], data: &[(String, FieldType)], errors: &mut Vec<ValidateError>) {
        for part in parts {
            if let Part::ForEach {
                collection_field,
                body,
                ..
            } = part
            {
                let is_array = data
                    .iter()
                    .any(|(n, t)| n == collection_field && matches!(t, FieldType::Array { .. }));
                if !is_array {
                    errors.push(ValidateError {
                        message_name: Some(message_name.to_string()),
                        detail: format!(
                            "for-each loop over {collection_field:?}, which is not a declared array field"
                        ),
                    });
                }
                walk(message_name, body, data, errors);
            }
        }
    }
    walk(&message.name, &message.parts, &message.data, errors);
}

fn check_state_reachability(protocol: &Protocol, errors: &mut Vec<ValidateError>) {
    let mut graph = DiGraph::<&str, &str>::new();
    let mut state_names: BTreeSet<&str> = BTreeSet::new();
    state_names.insert(protocol.initial_state.as_str());
    for m in &protocol.messages {
        state_names.insert(m.when.as_str());
        state_names.insert(m.then.as_str());
    }

    let nodes: std::collections::BTreeMap<&str, _> = state_names
        .iter()
        .map(|&name| (name, graph.add_node(name)))
        .collect();

    for m in &protocol.messages {
        graph.add_edge(nodes[m.when.as_str()], nodes[m.then.as_str()], m.name.as_str());
    }

    let Some(&start) = nodes.get(protocol.initial_state.as_str()) else {
        errors.push(ValidateError {
            message_name: None,
            detail: format!("initial state {:?} is not a node", protocol.initial_state),
        });
        return;
    };

    let mut reached: BTreeSet<&str> = BTreeSet::new();
    let mut dfs = Dfs::new(&graph, start);
    while let Some(node) = dfs.next(&graph) {
        reached.insert(graph[node]);
    }

    for &name in &state_names {
        if !reached.contains(name) {
            errors.push(ValidateError {
                message_name: None,
                detail: format!("state {name:?} is unreachable from {:?}", protocol.initial_state),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(name: &str, when: &str, then: &str) -> Message {
        Message {
            name: name.to_string(),
            when: when.to_string(),
            then: then.to_string(),
            agent: Agent::Client,
            data: Vec::new(),
            parts: Vec::new(),
        }
    }

    #[test]
    fn flags_unreachable_state() {
        let protocol = Protocol {
            initial_state: "Open".to_string(),
            messages: vec![msg("Close", "Open", "Closed"), msg("Ping", "Isolated", "Isolated")],
        };
        let errors = validate(&protocol);
        assert!(errors.iter().any(|e| e.detail.contains("Isolated")));
    }

    #[test]
    fn flags_for_each_over_non_array_field() {
        let mut m = msg("Batch", "Open", "Open");
        m.data.push(("count".to_string(), FieldType::Int {
            encoding: "Ascii".to_string(),
            unsigned: true,
            bits: 32,
        }));
        m.parts.push(Part::ForEach {
            loop_var: "x".to_string(),
            collection_field: "count".to_string(),
            body: vec![],
        });
        let protocol = Protocol {
            initial_state: "Open".to_string(),
            messages: vec![m],
        };
        let errors = validate(&protocol);
        assert!(errors.iter().any(|e| e.detail.contains("not a declared array field")));
    }
}
