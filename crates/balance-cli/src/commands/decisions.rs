use std::path::Path;

use balance_state::DecisionRecord;

use super::open_store;

pub fn list(db: &Path) -> anyhow::Result<()> {
    let store = open_store(db)?;
    let decisions = store.list_decisions()?;

    if decisions.is_empty() {
        println!("No decisions recorded.");
        return Ok(());
    }
    for d in &decisions {
        println!("{}", format_decision(d));
    }
    Ok(())
}

fn format_decision(d: &DecisionRecord) -> String {
    let demand: Vec<String> = d.demand.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!(
        "{}  cycle {:<4} {} → {}  [{}]",
        &d.id[..d.id.len().min(12)],
        d.cycle_id,
        d.pod,
        d.node,
        demand.join(", ")
    )
}
