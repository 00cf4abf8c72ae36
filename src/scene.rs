use crate::multivolume::{MultiVolume, MultiVolumeDisplayNode};

/// Handle of a node owned by a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Host scene graph. Adding a node hands its ownership to the scene.
pub trait Scene {
    fn add_display_node(&mut self, node: MultiVolumeDisplayNode) -> NodeId;
    fn add_multi_volume_node(&mut self, node: MultiVolume) -> NodeId;
    fn remove_node(&mut self, id: NodeId) -> bool;
}

#[derive(Debug)]
pub enum SceneNode {
    MultiVolume(MultiVolume),
    Display(MultiVolumeDisplayNode),
}

/// A scene kept in memory, used by the demo binary and by tests.
#[derive(Debug, Default)]
pub struct MemoryScene {
    nodes: Vec<Option<SceneNode>>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn multi_volume(&self, id: NodeId) -> Option<&MultiVolume> {
        match self.nodes.get(id.0)?.as_ref()? {
            SceneNode::MultiVolume(node) => Some(node),
            SceneNode::Display(_) => None,
        }
    }

    pub fn display_node(&self, id: NodeId) -> Option<&MultiVolumeDisplayNode> {
        match self.nodes.get(id.0)?.as_ref()? {
            SceneNode::Display(node) => Some(node),
            SceneNode::MultiVolume(_) => None,
        }
    }

    pub fn multi_volumes(&self) -> impl Iterator<Item = &MultiVolume> {
        self.nodes.iter().flatten().filter_map(|node| match node {
            SceneNode::MultiVolume(volume) => Some(volume),
            SceneNode::Display(_) => None,
        })
    }
}

impl Scene for MemoryScene {
    fn add_display_node(&mut self, node: MultiVolumeDisplayNode) -> NodeId {
        self.insert(SceneNode::Display(node))
    }

    fn add_multi_volume_node(&mut self, node: MultiVolume) -> NodeId {
        self.insert(SceneNode::MultiVolume(node))
    }

    fn remove_node(&mut self, id: NodeId) -> bool {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some()
    }
}
