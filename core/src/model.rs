//! IED object model: naming containers for control blocks.
//!
//! The model carries no behaviour of its own; it groups control blocks
//! under logical-node names the way substation configuration does, as a
//! flat owning tree.

use serde::{Deserialize, Serialize};

use crate::iec61850_9_2::svcb::SampledValueControlBlock;

/// A named grouping of control blocks within an IED.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogicalNode {
    name: String,
    control_blocks: Vec<SampledValueControlBlock>,
}

impl LogicalNode {
    pub fn new(name: impl Into<String>) -> Self {
        LogicalNode {
            name: name.into(),
            control_blocks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_control_block(&mut self, svcb: SampledValueControlBlock) {
        self.control_blocks.push(svcb);
    }

    pub fn control_blocks(&self) -> &[SampledValueControlBlock] {
        &self.control_blocks
    }

    pub fn control_block(&self, name: &str) -> Option<&SampledValueControlBlock> {
        self.control_blocks.iter().find(|svcb| svcb.name == name)
    }
}

/// The Intelligent Electronic Device container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IedModel {
    name: String,
    logical_nodes: Vec<LogicalNode>,
}

impl IedModel {
    pub fn new(name: impl Into<String>) -> Self {
        IedModel {
            name: name.into(),
            logical_nodes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_logical_node(&mut self, node: LogicalNode) {
        self.logical_nodes.push(node);
    }

    pub fn logical_nodes(&self) -> &[LogicalNode] {
        &self.logical_nodes
    }

    pub fn logical_node(&self, name: &str) -> Option<&LogicalNode> {
        self.logical_nodes.iter().find(|node| node.name == name)
    }

    /// Finds a control block anywhere in the model by its svID.
    pub fn control_block(&self, name: &str) -> Option<&SampledValueControlBlock> {
        self.logical_nodes
            .iter()
            .find_map(|node| node.control_block(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_tree() {
        let mut model = IedModel::new("TestModel");
        assert_eq!(model.name(), "TestModel");

        let mut mu = LogicalNode::new("MU01");
        mu.add_control_block(SampledValueControlBlock::new("SV01"));
        mu.add_control_block(SampledValueControlBlock::new("SV02"));
        model.add_logical_node(mu);
        model.add_logical_node(LogicalNode::new("PDIS"));

        assert_eq!(model.logical_nodes().len(), 2);
        assert_eq!(model.logical_nodes()[1].name(), "PDIS");
        assert_eq!(model.logical_node("MU01").unwrap().control_blocks().len(), 2);
    }

    #[test]
    fn test_control_block_lookup() {
        let mut model = IedModel::new("M");
        let mut node = LogicalNode::new("MU01");
        node.add_control_block(SampledValueControlBlock::new("SV01"));
        model.add_logical_node(node);

        assert!(model.control_block("SV01").is_some());
        assert!(model.control_block("SV99").is_none());
        assert!(model.logical_node("nope").is_none());
    }
}
