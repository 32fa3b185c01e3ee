//! k-limited calling contexts
//!
//! A context is an immutable sequence of interned items (call sites, receiver
//! allocation sites or callee functions) keeping only the `k` most recent ones.
//! Structurally equal contexts share one [`ContextID`].
//!
//! # Strategies
//! - [`KCallSiteSelector`]: append the call site
//! - [`KObjSelector`]: append the receiver's allocation site; static calls
//!   inherit the caller's context
//! - [`KFuncSelector`]: append the callee; entry contexts hold the entry itself

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::ContextType;
use crate::features::call_graph::domain::{CallSiteID, FuncID};
use crate::features::points_to::domain::pag::NodeID;

pub type ContextID = u32;
pub type ContextItemID = u32;

/// The empty context; also used for context-insensitive (singleton) bindings
pub const DUMMY_CID: ContextID = 0;

/// Sentinel context of container-element nodes
pub const CONTAINER_CID: ContextID = u32::MAX - 1;

/// One element of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextItem {
    CallSite { call_site: CallSiteID, callee: FuncID },
    Object { obj: NodeID },
    Func { func: FuncID },
}

/// Interns context items
#[derive(Debug, Default)]
pub struct ContextItemManager {
    items: Vec<ContextItem>,
    index: FxHashMap<ContextItem, ContextItemID>,
}

impl ContextItemManager {
    pub fn intern(&mut self, item: ContextItem) -> ContextItemID {
        if let Some(&id) = self.index.get(&item) {
            return id;
        }
        let id = self.items.len() as ContextItemID;
        self.items.push(item);
        self.index.insert(item, id);
        id
    }

    pub fn get(&self, id: ContextItemID) -> Option<&ContextItem> {
        self.items.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Immutable item sequence, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    items: Vec<ContextItemID>,
}

impl Context {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_item(item: ContextItemID, k: usize) -> Self {
        Self::empty().append(item, k)
    }

    /// New context with `item` appended, keeping the `k` most recent items
    pub fn append(&self, item: ContextItemID, k: usize) -> Self {
        if k == 0 {
            return Self::empty();
        }
        let mut items = self.items.clone();
        items.push(item);

        // k-limiting: drop the oldest
        if items.len() > k {
            items.drain(..items.len() - k);
        }

        Self { items }
    }

    pub fn items(&self) -> &[ContextItemID] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Contexts by id; the empty context is always [`DUMMY_CID`]
#[derive(Debug)]
pub struct ContextCache {
    contexts: Vec<Context>,
    index: FxHashMap<Context, ContextID>,
}

impl Default for ContextCache {
    fn default() -> Self {
        let mut cache = Self {
            contexts: Vec::new(),
            index: FxHashMap::default(),
        };
        cache.intern(Context::empty());
        cache
    }
}

impl ContextCache {
    pub fn intern(&mut self, ctx: Context) -> ContextID {
        if let Some(&id) = self.index.get(&ctx) {
            return id;
        }
        let id = self.contexts.len() as ContextID;
        self.contexts.push(ctx.clone());
        self.index.insert(ctx, id);
        id
    }

    pub fn get(&self, cid: ContextID) -> Option<&Context> {
        self.contexts.get(cid as usize)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }
}

/// Items, contexts and `k` shared by every selector
#[derive(Debug)]
pub struct ContextTable {
    k: usize,
    items: ContextItemManager,
    cache: ContextCache,
}

impl ContextTable {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            items: ContextItemManager::default(),
            cache: ContextCache::default(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn context(&self, cid: ContextID) -> Option<&Context> {
        self.cache.get(cid)
    }

    pub fn item(&self, id: ContextItemID) -> Option<&ContextItem> {
        self.items.get(id)
    }

    pub fn context_count(&self) -> usize {
        self.cache.len()
    }

    /// Caller context extended with `item`
    fn extend(&mut self, caller: ContextID, item: ContextItem) -> ContextID {
        let item_id = self.items.intern(item);
        let base = match self.cache.get(caller) {
            Some(ctx) => ctx.clone(),
            None => Context::empty(),
        };
        let ctx = base.append(item_id, self.k);
        self.cache.intern(ctx)
    }

    fn single(&mut self, item: ContextItem) -> ContextID {
        self.extend(DUMMY_CID, item)
    }

    /// Human-readable rendering for dumps
    pub fn describe(&self, cid: ContextID) -> String {
        if cid == CONTAINER_CID {
            return "[container]".to_string();
        }
        let Some(ctx) = self.cache.get(cid) else {
            return format!("[?{}]", cid);
        };
        let parts: Vec<String> = ctx
            .items()
            .iter()
            .map(|&id| match self.items.get(id) {
                Some(ContextItem::CallSite { call_site, callee }) => {
                    format!("cs{}->f{}", call_site, callee)
                }
                Some(ContextItem::Object { obj }) => format!("obj{}", obj),
                Some(ContextItem::Func { func }) => format!("f{}", func),
                None => "?".to_string(),
            })
            .collect();
        format!("[{}]", parts.join(", "))
    }
}

/// Context selection strategy
pub trait ContextSelector {
    fn table(&self) -> &ContextTable;

    fn table_mut(&mut self) -> &mut ContextTable;

    /// Context of an entry method
    fn empty_context(&mut self, func: FuncID) -> ContextID;

    /// Context of `callee` invoked from `caller_cid` at `call_site`.
    /// `obj` is the receiver's allocation-site node when known.
    fn select_context(
        &mut self,
        caller_cid: ContextID,
        call_site: CallSiteID,
        obj: Option<NodeID>,
        callee: FuncID,
    ) -> ContextID;

    fn context(&self, cid: ContextID) -> Option<&Context> {
        self.table().context(cid)
    }

    fn k(&self) -> usize {
        self.table().k()
    }
}

#[derive(Debug)]
pub struct KCallSiteSelector {
    table: ContextTable,
}

impl KCallSiteSelector {
    pub fn new(k: usize) -> Self {
        Self {
            table: ContextTable::new(k),
        }
    }
}

impl ContextSelector for KCallSiteSelector {
    fn table(&self) -> &ContextTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ContextTable {
        &mut self.table
    }

    fn empty_context(&mut self, _func: FuncID) -> ContextID {
        DUMMY_CID
    }

    fn select_context(
        &mut self,
        caller_cid: ContextID,
        call_site: CallSiteID,
        _obj: Option<NodeID>,
        callee: FuncID,
    ) -> ContextID {
        self.table
            .extend(caller_cid, ContextItem::CallSite { call_site, callee })
    }
}

#[derive(Debug)]
pub struct KObjSelector {
    table: ContextTable,
}

impl KObjSelector {
    pub fn new(k: usize) -> Self {
        Self {
            table: ContextTable::new(k),
        }
    }
}

impl ContextSelector for KObjSelector {
    fn table(&self) -> &ContextTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ContextTable {
        &mut self.table
    }

    fn empty_context(&mut self, _func: FuncID) -> ContextID {
        DUMMY_CID
    }

    fn select_context(
        &mut self,
        caller_cid: ContextID,
        _call_site: CallSiteID,
        obj: Option<NodeID>,
        _callee: FuncID,
    ) -> ContextID {
        match obj {
            Some(obj) => self.table.extend(caller_cid, ContextItem::Object { obj }),
            // static call: no receiver
            None if caller_cid == CONTAINER_CID => DUMMY_CID,
            None => caller_cid,
        }
    }
}

#[derive(Debug)]
pub struct KFuncSelector {
    table: ContextTable,
}

impl KFuncSelector {
    pub fn new(k: usize) -> Self {
        Self {
            table: ContextTable::new(k),
        }
    }
}

impl ContextSelector for KFuncSelector {
    fn table(&self) -> &ContextTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ContextTable {
        &mut self.table
    }

    fn empty_context(&mut self, func: FuncID) -> ContextID {
        self.table.single(ContextItem::Func { func })
    }

    fn select_context(
        &mut self,
        caller_cid: ContextID,
        _call_site: CallSiteID,
        _obj: Option<NodeID>,
        callee: FuncID,
    ) -> ContextID {
        self.table.extend(caller_cid, ContextItem::Func { func: callee })
    }
}

/// Selector for the configured strategy
pub fn new_selector(context_type: ContextType, k: usize) -> Box<dyn ContextSelector> {
    match context_type {
        ContextType::CallSite => Box::new(KCallSiteSelector::new(k)),
        ContextType::Object => Box::new(KObjSelector::new(k)),
        ContextType::Function => Box::new(KFuncSelector::new(k)),
    }
}
