use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, trace};

use crate::types::Type;

use super::error::{EvalError, EvalErrorKind, EvalResult, NameCategory};
use super::value::{Body, Function, Payload, Value, Variable};

/// Retained contexts tolerated before `release` runs a collection.
const COLLECT_THRESHOLD: usize = 64;

/// Generational handle into a [`Contexts`] arena. A handle outlives the
/// context it names only as a detectable stale handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId {
    index: u32,
    generation: u32,
}

/// Hold on a context, owned by the closures that captured it and by its
/// child contexts. A released context stays in the arena while a hold on it
/// may still be reached.
#[derive(Clone, Debug)]
pub struct Capture(Arc<ContextId>);

impl Capture {
    pub fn id(&self) -> ContextId {
        *self.0
    }
}

impl PartialEq for Capture {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

/// Name-keyed storage of a context. Clones of a context share one `Tables`.
#[derive(Debug, Default)]
pub struct Tables {
    /// Shadow stack per name, innermost binding last.
    pub variables: HashMap<String, Vec<Variable>>,
    /// Dotted namespace path to the child contexts opened under it.
    pub context_path: HashMap<String, Vec<ContextId>>,
    pub types: HashMap<String, Type>,
    /// Registration order is kept so the first accepting type wins.
    pub extensions: Vec<(Type, HashMap<String, Variable>)>,
}

impl Tables {
    fn clear(&mut self) {
        self.variables.clear();
        self.context_path.clear();
        self.types.clear();
        self.extensions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.context_path.is_empty()
            && self.types.is_empty()
            && self.extensions.is_empty()
    }
}

/// Recycled table storage, shareable between arenas on different threads.
#[derive(Clone, Debug)]
pub struct ContextPool {
    free: Arc<Mutex<Vec<Tables>>>,
    retain: usize,
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ContextPool {
    pub fn new(retain: usize) -> Self {
        Self {
            free: Arc::new(Mutex::new(Vec::new())),
            retain,
        }
    }

    pub fn take(&self) -> Tables {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        free.pop().unwrap_or_default()
    }

    /// Clears `tables` and keeps it for reuse while under the retention cap.
    pub fn give(&self, mut tables: Tables) {
        tables.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.retain {
            free.push(tables);
        }
    }

    pub fn pooled(&self) -> usize {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug, Default)]
pub struct Context {
    pub namespace: String,
    pub name: String,
    pub parameters: Vec<Value>,
    pub parent: Option<ContextId>,
    pub function: Option<Arc<Function>>,
    tables: Option<usize>,
    /// Set on clones: the parent chain was cloned along with this context.
    owns_parent: bool,
    /// Keeps the parent alive for as long as this context lives.
    anchor: Option<Capture>,
    holds: Option<Weak<ContextId>>,
    pinned: bool,
    retained: bool,
}

impl Context {
    /// True while some closure or child context holds this context.
    pub fn is_captured(&self) -> bool {
        self.holds
            .as_ref()
            .is_some_and(|holds| holds.strong_count() > 0)
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// True when every field reads back as freshly reset.
    pub fn is_zeroed(&self) -> bool {
        self.namespace.is_empty()
            && self.name.is_empty()
            && self.parameters.is_empty()
            && self.parent.is_none()
            && self.function.is_none()
            && self.tables.is_none()
            && !self.owns_parent
            && self.anchor.is_none()
            && self.holds.is_none()
            && !self.pinned
            && !self.retained
    }
}

struct Slot {
    generation: u32,
    context: Option<Context>,
}

struct TableSlot {
    refs: usize,
    tables: Tables,
}

pub struct Contexts {
    slots: Vec<Slot>,
    free: Vec<u32>,
    tables: Vec<Option<TableSlot>>,
    free_tables: Vec<usize>,
    pool: ContextPool,
    /// Released contexts that a closure may still reach.
    retained: Vec<ContextId>,
    collect_at: usize,
}

impl Default for Contexts {
    fn default() -> Self {
        Self::new(ContextPool::default())
    }
}

impl Contexts {
    pub fn new(pool: ContextPool) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            tables: Vec::new(),
            free_tables: Vec::new(),
            pool,
            retained: Vec::new(),
            collect_at: COLLECT_THRESHOLD,
        }
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }

    pub fn is_live(&self, id: ContextId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: ContextId) -> EvalResult<&Context> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.context.as_ref())
            .ok_or_else(stale)
    }

    pub fn get_mut(&mut self, id: ContextId) -> EvalResult<&mut Context> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.context.as_mut())
            .ok_or_else(stale)
    }

    fn insert(&mut self, context: Context) -> ContextId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.context = Some(context);
            trace!(index, generation = slot.generation, "reused context slot");
            return ContextId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            context: Some(context),
        });
        ContextId {
            index,
            generation: 0,
        }
    }

    fn new_tables(&mut self) -> usize {
        let slot = TableSlot {
            refs: 1,
            tables: self.pool.take(),
        };
        if let Some(index) = self.free_tables.pop() {
            self.tables[index] = Some(slot);
            index
        } else {
            self.tables.push(Some(slot));
            self.tables.len() - 1
        }
    }

    fn share_tables(&mut self, index: usize) {
        if let Some(Some(slot)) = self.tables.get_mut(index) {
            slot.refs += 1;
        }
    }

    /// Drops one reference to a table set. The last one hands the set back
    /// to the pool and yields the namespaces that were registered in it.
    fn drop_tables(&mut self, index: usize) -> Vec<ContextId> {
        let Some(entry) = self.tables.get_mut(index) else {
            return Vec::new();
        };
        let last = match entry {
            Some(slot) => {
                slot.refs -= 1;
                slot.refs == 0
            }
            None => false,
        };
        let Some(mut slot) = entry.take_if(|_| last) else {
            return Vec::new();
        };
        let namespaces = slot
            .tables
            .context_path
            .drain()
            .flat_map(|(_, children)| children)
            .collect();
        self.pool.give(slot.tables);
        self.free_tables.push(index);
        trace!(index, "returned tables to pool");
        namespaces
    }

    /// A fresh context with empty tables under `parent`.
    pub fn acquire(&mut self, parent: Option<ContextId>) -> ContextId {
        let tables = self.new_tables();
        self.insert(Context {
            parent,
            tables: Some(tables),
            ..Context::default()
        })
    }

    /// A fresh context under `parent` that keeps `parent` alive.
    pub fn acquire_child(&mut self, parent: ContextId) -> EvalResult<ContextId> {
        let anchor = self.capture(parent)?;
        let child = self.acquire(Some(parent));
        self.get_mut(child)?.anchor = Some(anchor);
        Ok(child)
    }

    /// Hands out a hold on `id` for a closure that captures it.
    pub fn capture(&mut self, id: ContextId) -> EvalResult<Capture> {
        let context = self.get_mut(id)?;
        if let Some(hold) = context.holds.as_ref().and_then(Weak::upgrade) {
            return Ok(Capture(hold));
        }
        let hold = Arc::new(id);
        context.holds = Some(Arc::downgrade(&hold));
        Ok(Capture(hold))
    }

    /// Copies `id` and, recursively, its parent chain. The copies share the
    /// originals' tables; parameter lists are independent.
    pub fn clone_context(&mut self, id: ContextId) -> EvalResult<ContextId> {
        let (parent, tables, copy) = {
            let source = self.get(id)?;
            (
                source.parent,
                source.tables,
                Context {
                    namespace: source.namespace.clone(),
                    name: source.name.clone(),
                    parameters: source.parameters.clone(),
                    function: source.function.clone(),
                    ..Context::default()
                },
            )
        };
        let parent = match parent {
            Some(parent) => Some(self.clone_context(parent)?),
            None => None,
        };
        if let Some(index) = tables {
            self.share_tables(index);
        }
        Ok(self.insert(Context {
            parent,
            tables,
            owns_parent: parent.is_some(),
            ..copy
        }))
    }

    /// Resets `id` to zero and frees its slot. Cloned ancestors and the
    /// namespaces opened in its tables go with it.
    pub fn cleanup(&mut self, id: ContextId) -> EvalResult<()> {
        let context = std::mem::take(self.get_mut(id)?);
        let namespaces = match context.tables {
            Some(index) => self.drop_tables(index),
            None => Vec::new(),
        };
        let slot = &mut self.slots[id.index as usize];
        slot.context = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        for namespace in namespaces {
            if self.is_live(namespace) {
                self.cleanup(namespace)?;
            }
        }
        if context.owns_parent
            && let Some(parent) = context.parent
        {
            self.cleanup(parent)?;
        }
        Ok(())
    }

    /// Cleans up `id` once its frame or block is done. A context something
    /// still holds is retained instead and left to `collect`; pinned ones
    /// are left alone.
    pub fn release(&mut self, id: ContextId) -> EvalResult<()> {
        let context = self.get_mut(id)?;
        if context.pinned || context.retained {
            return Ok(());
        }
        if !context.is_captured() {
            return self.cleanup(id);
        }
        context.retained = true;
        self.retained.push(id);
        trace!(index = id.index, "retained captured context");
        if self.retained.len() >= self.collect_at {
            self.collect();
        }
        Ok(())
    }

    /// Keeps `id` across `release`. It is still freed along with the
    /// context that owns it.
    pub fn pin(&mut self, id: ContextId) -> EvalResult<()> {
        self.get_mut(id)?.pinned = true;
        Ok(())
    }

    /// Frees every retained context that can no longer be reached from
    /// outside the retained set. Holds found inside the set are discounted,
    /// so closures that only refer to each other are freed too.
    pub fn collect(&mut self) {
        let members = self.collection_set();
        let garbage = self.unreachable(&members);
        for &id in &garbage {
            if self.is_live(id)
                && let Err(err) = self.cleanup(id)
            {
                trace!("could not free retained context: {err}");
            }
        }
        let retained = std::mem::take(&mut self.retained);
        self.retained = retained
            .into_iter()
            .filter(|id| self.is_live(*id))
            .collect();
        self.collect_at = (self.retained.len() * 2).max(COLLECT_THRESHOLD);
        debug!(
            freed = garbage.len(),
            retained = self.retained.len(),
            "collected contexts"
        );
    }

    /// Retained contexts plus the namespaces opened inside them.
    fn collection_set(&self) -> Vec<ContextId> {
        let mut members = Vec::new();
        let mut seen = HashSet::new();
        let mut pending: Vec<ContextId> = self.retained.clone();
        while let Some(id) = pending.pop() {
            if !self.is_live(id) || !seen.insert(id) {
                continue;
            }
            members.push(id);
            if let Ok(Some(tables)) = self.tables(id) {
                pending.extend(tables.context_path.values().flatten().copied());
            }
        }
        members
    }

    fn unreachable(&self, members: &[ContextId]) -> Vec<ContextId> {
        let mut census = Census::default();
        for &id in members {
            self.survey(&mut census, id);
        }

        let mut pending = Vec::new();
        for (&key, (function, seen)) in &census.functions {
            if Arc::strong_count(*function) > *seen {
                pending.push(Node::Function(key));
            }
        }
        for &id in members {
            let holds = self
                .get(id)
                .ok()
                .and_then(|context| context.holds.as_ref())
                .map_or(0, Weak::strong_count);
            if holds > census.holds.get(&id).copied().unwrap_or(0) {
                pending.push(Node::Context(id));
            }
        }

        let mut live = HashSet::new();
        while let Some(node) = pending.pop() {
            if live.insert(node)
                && let Some(next) = census.edges.get(&node)
            {
                pending.extend(next.iter().copied());
            }
        }
        members
            .iter()
            .copied()
            .filter(|id| !live.contains(&Node::Context(*id)))
            .collect()
    }

    /// Records every hold and function reference stored in `id`.
    fn survey<'a>(&'a self, census: &mut Census<'a>, id: ContextId) {
        let Ok(context) = self.get(id) else {
            return;
        };
        let node = Node::Context(id);
        if let Some(anchor) = &context.anchor {
            census.hold(node, anchor.id());
        }
        if let Some(function) = &context.function {
            census.function(node, function);
        }
        for value in &context.parameters {
            census.value(node, value);
        }
        let Ok(Some(tables)) = self.tables(id) else {
            return;
        };
        for variable in tables.variables.values().flatten() {
            census.value(node, &variable.value);
        }
        for (_, methods) in &tables.extensions {
            for variable in methods.values() {
                census.value(node, &variable.value);
            }
        }
        for child in tables.context_path.values().flatten() {
            census.edge(node, Node::Context(*child));
        }
    }

    pub fn tables(&self, id: ContextId) -> EvalResult<Option<&Tables>> {
        let context = self.get(id)?;
        Ok(context
            .tables
            .and_then(|index| self.tables.get(index))
            .and_then(|slot| slot.as_ref())
            .map(|slot| &slot.tables))
    }

    fn tables_mut(&mut self, id: ContextId) -> EvalResult<&mut Tables> {
        let index = self.get(id)?.tables;
        index
            .and_then(|index| self.tables.get_mut(index))
            .and_then(|slot| slot.as_mut())
            .map(|slot| &mut slot.tables)
            .ok_or_else(stale)
    }

    /// Ancestor chain starting at `id` itself.
    fn chain(&self, id: ContextId) -> EvalResult<Vec<ContextId>> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(next) = current {
            chain.push(next);
            current = self.get(next)?.parent;
        }
        Ok(chain)
    }

    pub fn parameters(&self, id: ContextId) -> EvalResult<&[Value]> {
        Ok(&self.get(id)?.parameters)
    }

    pub fn set_parameters(&mut self, id: ContextId, parameters: Vec<Value>) -> EvalResult<()> {
        self.get_mut(id)?.parameters = parameters;
        Ok(())
    }

    /// Pushes a binding in `id` itself; never touches the parents.
    pub fn define(&mut self, id: ContextId, variable: Variable) -> EvalResult<()> {
        self.tables_mut(id)?
            .variables
            .entry(variable.name.clone())
            .or_default()
            .push(variable);
        Ok(())
    }

    /// Pops the innermost binding of `name` in `id`.
    pub fn undefine(&mut self, id: ContextId, name: &str) -> EvalResult<Option<Variable>> {
        let tables = self.tables_mut(id)?;
        let Some(stack) = tables.variables.get_mut(name) else {
            return Ok(None);
        };
        let popped = stack.pop();
        if stack.is_empty() {
            tables.variables.remove(name);
        }
        Ok(popped)
    }

    fn owner_of(&self, id: ContextId, name: &str) -> EvalResult<Option<ContextId>> {
        for context in self.chain(id)? {
            let bound = self
                .tables(context)?
                .and_then(|tables| tables.variables.get(name))
                .is_some_and(|stack| !stack.is_empty());
            if bound {
                return Ok(Some(context));
            }
        }
        Ok(None)
    }

    /// Innermost binding of `name` in `id` or its ancestors.
    pub fn lookup(&self, id: ContextId, name: &str) -> EvalResult<&Variable> {
        self.owner_of(id, name)?
            .and_then(|owner| self.lookup_local(owner, name))
            .ok_or_else(|| EvalError::unresolved(NameCategory::Variable, name))
    }

    pub fn lookup_mut(&mut self, id: ContextId, name: &str) -> EvalResult<&mut Variable> {
        let owner = self
            .owner_of(id, name)?
            .ok_or_else(|| EvalError::unresolved(NameCategory::Variable, name))?;
        self.tables_mut(owner)?
            .variables
            .get_mut(name)
            .and_then(|stack| stack.last_mut())
            .ok_or_else(|| EvalError::unresolved(NameCategory::Variable, name))
    }

    /// Binding of `name` in `id` alone.
    pub fn lookup_local(&self, id: ContextId, name: &str) -> Option<&Variable> {
        self.tables(id)
            .ok()
            .flatten()
            .and_then(|tables| tables.variables.get(name))
            .and_then(|stack| stack.last())
    }

    pub fn is_defined(&self, id: ContextId, name: &str) -> bool {
        matches!(self.owner_of(id, name), Ok(Some(_)))
    }

    /// Binds a type name in `id`, handing back what it replaced.
    pub fn define_type(&mut self, id: ContextId, name: &str, ty: Type) -> EvalResult<Option<Type>> {
        Ok(self.tables_mut(id)?.types.insert(name.to_string(), ty))
    }

    pub fn remove_type(&mut self, id: ContextId, name: &str) -> EvalResult<Option<Type>> {
        Ok(self.tables_mut(id)?.types.remove(name))
    }

    pub fn lookup_type(&self, id: ContextId, name: &str) -> EvalResult<Option<&Type>> {
        for context in self.chain(id)? {
            if let Some(ty) = self
                .tables(context)?
                .and_then(|tables| tables.types.get(name))
            {
                return Ok(Some(ty));
            }
        }
        Ok(None)
    }

    pub fn register_extension(
        &mut self,
        id: ContextId,
        target: Type,
        method: Variable,
    ) -> EvalResult<()> {
        let extensions = &mut self.tables_mut(id)?.extensions;
        let index = match extensions.iter().position(|(ty, _)| *ty == target) {
            Some(index) => index,
            None => {
                extensions.push((target, HashMap::new()));
                extensions.len() - 1
            }
        };
        extensions[index].1.insert(method.name.clone(), method);
        Ok(())
    }

    /// Walks from `id` to the root. In each context an extension registered
    /// for exactly `ty` wins over the first registered type accepting `ty`.
    pub fn find_extension(&self, id: ContextId, ty: &Type, name: &str) -> EvalResult<Option<&Variable>> {
        for context in self.chain(id)? {
            let Some(tables) = self.tables(context)? else {
                continue;
            };
            let exact = tables
                .extensions
                .iter()
                .filter(|(target, _)| target == ty)
                .find_map(|(_, methods)| methods.get(name));
            if exact.is_some() {
                return Ok(exact);
            }
            let accepting = tables
                .extensions
                .iter()
                .filter(|(target, _)| target.accepts(ty))
                .find_map(|(_, methods)| methods.get(name));
            if accepting.is_some() {
                return Ok(accepting);
            }
        }
        Ok(None)
    }

    pub fn register_path(&mut self, id: ContextId, path: &str, child: ContextId) -> EvalResult<()> {
        self.tables_mut(id)?
            .context_path
            .entry(path.to_string())
            .or_default()
            .push(child);
        Ok(())
    }

    /// Resolves the longest dotted prefix of `segments` registered as a
    /// namespace in `id` or its ancestors. Returns the namespace contexts
    /// (latest first) and how many segments they consumed.
    pub fn resolve_path(&self, id: ContextId, segments: &[String]) -> EvalResult<Option<(Vec<ContextId>, usize)>> {
        for len in (1..=segments.len()).rev() {
            let path = segments[..len].join(".");
            for context in self.chain(id)? {
                if let Some(children) = self
                    .tables(context)?
                    .and_then(|tables| tables.context_path.get(&path))
                    && !children.is_empty()
                {
                    return Ok(Some((children.iter().rev().copied().collect(), len)));
                }
            }
        }
        Ok(None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Node {
    Context(ContextId),
    Function(*const Function),
}

/// References found inside the contexts a collection looks at.
#[derive(Default)]
struct Census<'a> {
    edges: HashMap<Node, Vec<Node>>,
    /// Each function allocation with the number of references to it.
    functions: HashMap<*const Function, (&'a Arc<Function>, usize)>,
    holds: HashMap<ContextId, usize>,
}

impl<'a> Census<'a> {
    fn edge(&mut self, from: Node, to: Node) {
        self.edges.entry(from).or_default().push(to);
    }

    fn hold(&mut self, from: Node, id: ContextId) {
        *self.holds.entry(id).or_default() += 1;
        self.edge(from, Node::Context(id));
    }

    fn value(&mut self, from: Node, value: &'a Value) {
        match &value.payload {
            Payload::Function(function) => self.function(from, function),
            Payload::Collection(items) => {
                for item in items {
                    self.value(from, item);
                }
            }
            Payload::Map(entries) => {
                for (key, value) in entries {
                    self.value(from, key);
                    self.value(from, value);
                }
            }
            Payload::Struct(fields) => {
                for field in fields {
                    self.value(from, &field.value);
                }
            }
            _ => {}
        }
    }

    fn function(&mut self, from: Node, function: &'a Arc<Function>) {
        let key = Arc::as_ptr(function);
        self.edge(from, Node::Function(key));
        if let Some((_, seen)) = self.functions.get_mut(&key) {
            *seen += 1;
            return;
        }
        self.functions.insert(key, (function, 1));
        let node = Node::Function(key);
        if let Body::Tree { captured, .. } = &function.body {
            self.hold(node, captured.id());
        }
        for param in &function.signature.parameters {
            if let Some(default) = &param.default {
                self.value(node, default);
            }
        }
    }
}

fn stale() -> EvalError {
    EvalError::new(EvalErrorKind::StaleContext)
}
