//! 作用域销毁树
//!
//! 以父 → 子的竞技场关系表示销毁顺序：子节点先于父节点拆除，
//! 同级节点按注册的逆序拆除。树只持有实例的弱引用，实例归属于创建它的槽位。

use crate::errors::{LifecycleError, LifecycleResult};
use crate::service::Disposable;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// 销毁树节点标识
///
/// 槽位下标加代数：节点拆除后槽位代数递增并可被复用，
/// 旧标识因代数落后而被识别为已拆除。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    tree: uuid::Uuid,
    index: u32,
    generation: u64,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}.{}", self.tree, self.index, self.generation)
    }
}

/// 节点信息快照
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    target: Option<Weak<dyn Disposable>>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl Node {
    fn new(name: String, parent: Option<NodeId>, target: Option<Weak<dyn Disposable>>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            target,
            created_at: chrono::Utc::now(),
        }
    }

    /// 实例已释放且没有子节点的叶子，可以直接回收
    fn is_dead_leaf(&self) -> bool {
        self.children.is_empty()
            && self
                .target
                .as_ref()
                .is_some_and(|target| target.strong_count() == 0)
    }
}

struct Entry {
    generation: u64,
    node: Option<Node>,
}

enum Lookup {
    Live,
    Disposed,
    NotFound,
}

struct Arena {
    tree: uuid::Uuid,
    entries: Vec<Entry>,
    free: Vec<u32>,
}

impl Arena {
    fn status(&self, id: NodeId) -> Lookup {
        if id.tree != self.tree {
            return Lookup::NotFound;
        }
        match self.entries.get(id.index as usize) {
            Some(entry) if entry.generation == id.generation && entry.node.is_some() => Lookup::Live,
            Some(entry) if id.generation < entry.generation => Lookup::Disposed,
            _ => Lookup::NotFound,
        }
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        match self.status(id) {
            Lookup::Live => self.entries[id.index as usize].node.as_ref(),
            _ => None,
        }
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        match self.status(id) {
            Lookup::Live => self.entries[id.index as usize].node.as_mut(),
            _ => None,
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let index = match self.free.pop() {
            Some(index) => {
                self.entries[index as usize].node = Some(node);
                index
            }
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    node: Some(node),
                });
                (self.entries.len() - 1) as u32
            }
        };
        NodeId {
            tree: self.tree,
            index,
            generation: self.entries[index as usize].generation,
        }
    }

    fn release(&mut self, id: NodeId) -> Option<Node> {
        let entry = self.entries.get_mut(id.index as usize)?;
        let node = entry.node.take()?;
        entry.generation += 1;
        self.free.push(id.index);
        Some(node)
    }

    /// 回收 `parent` 下实例已释放的叶子节点
    fn prune_dead_children(&mut self, parent: NodeId) -> usize {
        let children = match self.get(parent) {
            Some(node) => node.children.clone(),
            None => return 0,
        };
        let dead: Vec<NodeId> = children
            .into_iter()
            .filter(|child| self.get(*child).is_some_and(Node::is_dead_leaf))
            .collect();
        if dead.is_empty() {
            return 0;
        }
        for child in &dead {
            self.release(*child);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.retain(|child| !dead.contains(child));
        }
        dead.len()
    }

    fn live_nodes(&self) -> usize {
        self.entries.len() - self.free.len()
    }
}

/// 销毁树
///
/// 节点存放在可复用的槽位中，反复打开和关闭作用域不会让树无限增长。
pub struct DisposalTree {
    root: NodeId,
    arena: Mutex<Arena>,
}

impl DisposalTree {
    /// 创建只有根节点的销毁树
    pub fn new() -> Self {
        let mut arena = Arena {
            tree: uuid::Uuid::new_v4(),
            entries: Vec::new(),
            free: Vec::new(),
        };
        let root = arena.alloc(Node::new("root".to_string(), None, None));
        Self {
            root,
            arena: Mutex::new(arena),
        }
    }

    /// 根节点
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 在 `parent` 下创建作用域节点
    pub fn create_scope(&self, parent: NodeId, name: impl Into<String>) -> LifecycleResult<NodeId> {
        let name = name.into();
        let id = self.attach(parent, Node::new(name.clone(), Some(parent), None))?;
        debug!("创建作用域节点: {} ({})", name, id);
        Ok(id)
    }

    /// 将可销毁实例注册为 `parent` 的子节点
    ///
    /// 树只保存弱引用。
    pub fn register(
        &self,
        parent: NodeId,
        target: &Arc<dyn Disposable>,
        name: impl Into<String>,
    ) -> LifecycleResult<NodeId> {
        let node = Node::new(name.into(), Some(parent), Some(Arc::downgrade(target)));
        self.attach(parent, node)
    }

    fn attach(&self, parent: NodeId, node: Node) -> LifecycleResult<NodeId> {
        let mut arena = self.arena.lock();
        match arena.status(parent) {
            Lookup::Live => {}
            Lookup::Disposed => {
                return Err(LifecycleError::ScopeDisposed {
                    scope_id: parent.to_string(),
                })
            }
            Lookup::NotFound => {
                return Err(LifecycleError::ScopeNotFound {
                    scope_id: parent.to_string(),
                })
            }
        }

        let pruned = arena.prune_dead_children(parent);
        if pruned > 0 {
            debug!("回收已释放实例节点: {} 个 (父节点 {})", pruned, parent);
        }

        let id = arena.alloc(node);
        if let Some(parent_node) = arena.get_mut(parent) {
            parent_node.children.push(id);
        }
        Ok(id)
    }

    /// 拆除节点及其整棵子树
    ///
    /// 返回实际调用了 `dispose` 的实例数量。重复拆除是空操作。
    pub fn dispose(&self, id: NodeId) -> usize {
        let targets = {
            let mut arena = self.arena.lock();
            if arena.get(id).is_none() {
                return 0;
            }

            let mut order = Vec::new();
            collect_post_order(&arena, id, &mut order);

            if let Some(parent) = arena.get(id).and_then(|node| node.parent) {
                if let Some(parent_node) = arena.get_mut(parent) {
                    parent_node.children.retain(|child| *child != id);
                }
            }

            let mut targets = Vec::with_capacity(order.len());
            for node_id in order {
                if let Some(node) = arena.release(node_id) {
                    if let Some(target) = node.target {
                        targets.push((node.name, target));
                    }
                }
            }
            targets
        };

        let mut disposed = 0;
        for (name, target) in targets {
            if let Some(instance) = target.upgrade() {
                debug!("销毁实例: {}", name);
                instance.dispose();
                disposed += 1;
            }
        }

        info!("作用域 {} 已拆除, 销毁 {} 个实例", id, disposed);
        disposed
    }

    /// 节点是否已拆除
    pub fn is_disposed(&self, id: NodeId) -> bool {
        matches!(self.arena.lock().status(id), Lookup::Disposed)
    }

    /// 节点的直接子节点
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.arena
            .lock()
            .get(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// 节点信息快照
    pub fn node_info(&self, id: NodeId) -> Option<NodeInfo> {
        let arena = self.arena.lock();
        arena.get(id).map(|node| NodeInfo {
            id,
            name: node.name.clone(),
            parent: node.parent,
            children: node.children.len(),
            created_at: node.created_at,
        })
    }

    /// 存活节点数量，含根节点
    pub fn len(&self) -> usize {
        self.arena.lock().live_nodes()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 已分配的槽位数量
    pub fn capacity(&self) -> usize {
        self.arena.lock().entries.len()
    }
}

impl Default for DisposalTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DisposalTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.arena.lock();
        f.debug_struct("DisposalTree")
            .field("root", &self.root)
            .field("live_nodes", &arena.live_nodes())
            .field("free_slots", &arena.free.len())
            .finish()
    }
}

/// 子节点先于父节点，同级按注册逆序
fn collect_post_order(arena: &Arena, id: NodeId, order: &mut Vec<NodeId>) {
    if let Some(node) = arena.get(id) {
        for child in node.children.iter().rev() {
            collect_post_order(arena, *child, order);
        }
    }
    order.push(id);
}
