//! Debug artifacts of a finished run
//!
//! Files written into the configured dump directory:
//! - `pag.dot` / `cg.dot`: Graphviz renderings (when `dot_graphs` is set)
//! - `unhandled_funcs.json`: bodiless callees no plugin modelled
//! - `pta_stats.json`: [`PtaStats`](super::solver::PtaStats) of the run

use std::fs;
use std::path::Path;

use tracing::info;

use super::solver::PointerAnalysis;
use crate::errors::Result;

pub const PAG_DOT: &str = "pag.dot";
pub const CALL_GRAPH_DOT: &str = "cg.dot";
pub const UNHANDLED_FUNCS_JSON: &str = "unhandled_funcs.json";
pub const STATS_JSON: &str = "pta_stats.json";

/// Writes the artifacts enabled in the dump config; a no-op without a
/// dump directory
pub fn write_dumps(pta: &PointerAnalysis<'_>) -> Result<()> {
    let dump = pta.config().dump();
    let Some(dir) = dump.dir.as_deref() else {
        return Ok(());
    };
    fs::create_dir_all(dir)?;

    if dump.dot_graphs {
        write_file(dir, PAG_DOT, &pta.pag().to_dot())?;
        write_file(dir, CALL_GRAPH_DOT, &pta.call_graph().to_dot())?;
    }
    if dump.unhandled_funcs {
        let names: Vec<String> = pta.unhandled_funcs().iter().map(|sig| sig.to_string()).collect();
        write_file(dir, UNHANDLED_FUNCS_JSON, &serde_json::to_string_pretty(&names)?)?;
    }
    write_file(dir, STATS_JSON, &serde_json::to_string_pretty(pta.stats())?)?;

    info!(dir = %dir.display(), "Analysis dumps written");
    Ok(())
}

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<()> {
    fs::write(dir.join(name), contents)?;
    Ok(())
}
