use serde::{Deserialize, Serialize};

/// Which partitioning dimension a shard assignment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataElement {
    User,
    Group,
    GroupToGroupMapping,
}

impl std::fmt::Display for DataElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataElement::User => write!(f, "User"),
            DataElement::Group => write!(f, "Group"),
            DataElement::GroupToGroupMapping => write!(f, "GroupToGroupMapping"),
        }
    }
}

/// Whether an operation reads or mutates the authorization graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    Query,
    Event,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Query => write!(f, "Query"),
            Operation::Event => write!(f, "Event"),
        }
    }
}
