//! Points-to domain: sets, the incremental store, contexts and the PAG

pub mod context;
pub mod diff_pt_data;
pub mod func_pag;
pub mod pag;
pub mod pts_set;

pub use context::{
    new_selector, Context, ContextID, ContextItem, ContextSelector, ContextTable, KCallSiteSelector,
    KFuncSelector, KObjSelector, CONTAINER_CID, DUMMY_CID,
};
pub use diff_pt_data::DiffPTData;
pub use func_pag::{FreeValue, FuncPag, IntraEdge};
pub use pag::{
    ContainerKind, FieldKey, FunctionObject, NodeID, Pag, PagEdgeKind, PagNode, PagNodeKind,
    PagValue, SiteRef, SiteRole,
};
pub use pts_set::{BitVecPtsSet, HashPtsSet, PointsToSet, PtsSet};
