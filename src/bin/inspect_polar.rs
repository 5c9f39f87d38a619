use sail_routing::parsers::polars::PolarTable;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let path_str = std::env::args().nth(1).unwrap_or_else(|| "data/cruiser_40.csv".to_string());
    println!("Opening {}...", path_str);

    let polar = PolarTable::load_from_csv(&path_str)?;

    print!("{:>8}", "twa/tws");
    for tws in polar.wind_speeds() {
        print!("{:>7.1}", tws);
    }
    println!();
    for (i, twa) in polar.wind_angles().iter().enumerate() {
        print!("{:>8.0}", twa);
        for speed in polar.row(i) {
            print!("{:>7.2}", speed);
        }
        println!();
    }
    println!("Max boat speed: {:.2} kts", polar.max_speed());

    println!("\nVMG optima:");
    for &tws in polar.wind_speeds().iter().filter(|tws| **tws > 0.0) {
        let up = polar.best_vmg(tws, true);
        let down = polar.best_vmg(tws, false);
        println!(
            "  {:>5.1} kts: upwind {:.0}° at {:.2} kts (VMG {:.2}), downwind {:.0}° at {:.2} kts (VMG {:.2})",
            tws, up.twa, up.boat_speed, up.vmg, down.twa, down.boat_speed, down.vmg
        );
    }

    Ok(())
}
