use anyhow::{Context, Result};
use csnd_core::TIME_EPSILON;
use csnd_io::read_instance;

pub fn handle(path: &str) -> Result<()> {
    let instance = read_instance(path).with_context(|| format!("reading instance {path}"))?;

    println!("Instance is valid: {}", instance.name());
    println!("  {} nodes", instance.num_nodes());
    println!("  {} arcs", instance.arcs().len());
    println!("  {} commodities", instance.commodities().len());
    println!("  horizon {}", instance.horizon());

    for k in instance.commodity_ids() {
        let commodity = instance.commodity(k);
        let fastest = instance.travel_times_from(commodity.source)[commodity.sink.index()];
        match fastest {
            None => println!("  Warning: commodity {k} has no route to its sink"),
            Some(tt) if commodity.release + tt > commodity.deadline + TIME_EPSILON => println!(
                "  Warning: commodity {k} needs {tt} time units but has {}",
                commodity.deadline - commodity.release
            ),
            Some(_) => {}
        }
    }

    Ok(())
}
