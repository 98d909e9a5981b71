use std::time::Duration;

use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};
use haulage_osrm::{
    Coordinate, RouteAnalyzer, RouteAnalyzerParams, client::DEFAULT_OSRM_URL,
    route_profile::RouteProfile,
};

use crate::parsers;

#[derive(Args)]
pub struct ClientArgs {
    #[arg(long, env = "HAULAGE_OSRM_URL", default_value = DEFAULT_OSRM_URL)]
    osrm_url: String,

    /// Profile segment of the request path (driving, truck)
    #[arg(long, env = "HAULAGE_PROFILE", default_value = "driving")]
    profile: RouteProfile,

    /// Request timeout (e.g., "30s", "2m")
    #[arg(long, env = "HAULAGE_TIMEOUT", default_value = "90s", value_parser = parsers::parse_duration)]
    timeout: jiff::SignedDuration,

    /// Print the raw result as JSON
    #[arg(long)]
    json: bool,
}

impl ClientArgs {
    fn analyzer(&self) -> anyhow::Result<RouteAnalyzer> {
        Ok(RouteAnalyzer::new(RouteAnalyzerParams {
            osrm_url: self.osrm_url.clone(),
            profile: self.profile,
            timeout: Duration::try_from(self.timeout)
                .map_err(|_| anyhow::anyhow!("Timeout must be positive"))?,
        })?)
    }
}

#[derive(Args)]
pub struct RouteArgs {
    #[command(flatten)]
    client: ClientArgs,

    /// Origin as lon,lat
    #[arg(long, value_parser = parsers::parse_coordinate, allow_hyphen_values = true)]
    from: Coordinate,

    /// Destination as lon,lat
    #[arg(long, value_parser = parsers::parse_coordinate, allow_hyphen_values = true)]
    to: Coordinate,

    /// Number of routes to ask for
    #[arg(short, long, default_value_t = 3)]
    alternatives: usize,

    #[arg(long)]
    geometry: bool,

    #[arg(long)]
    steps: bool,
}

#[derive(Args)]
pub struct MatrixArgs {
    #[command(flatten)]
    client: ClientArgs,

    /// Origin as lon,lat, repeatable
    #[arg(long = "origin", value_parser = parsers::parse_coordinate, allow_hyphen_values = true, required = true)]
    origins: Vec<Coordinate>,

    /// Destination as lon,lat, repeatable (default: the origins)
    #[arg(long = "destination", value_parser = parsers::parse_coordinate, allow_hyphen_values = true)]
    destinations: Vec<Coordinate>,
}

pub async fn route(args: RouteArgs) -> anyhow::Result<()> {
    let analyzer = args.client.analyzer()?;
    let result = analyzer
        .get_routes(
            args.from,
            args.to,
            args.alternatives,
            args.geometry,
            args.steps,
        )
        .await?;

    if args.client.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "#",
        "Distance (km)",
        "Duration (min)",
        "Avg speed (km/h)",
        "Fuel (USD)",
        "Truck score",
        "Quality",
    ]);

    for (index, option) in result.routes.iter().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            format!("{:.1}", option.distance_km()),
            format!("{:.1}", option.duration_minutes()),
            format!("{:.1}", option.avg_speed_kmh()),
            format!("{:.2}", option.estimated_fuel_cost()),
            format!("{:.2}", option.truck_suitability_score()),
            format!("{:.2}", option.route_quality_score()),
        ]);
    }

    println!("{table}");

    let (min_km, max_km) = result.distance_range();
    let (min_cost, max_cost) = result.fuel_cost_range();
    println!("Distance: {min_km:.1} to {max_km:.1} km");
    println!("Fuel cost: {min_cost:.2} to {max_cost:.2} USD");
    println!(
        "Fastest: {:.1} min",
        result.fastest_route.duration_minutes()
    );
    if let Some(shortest) = &result.shortest_route {
        println!("Shortest: {:.1} km", shortest.distance_km());
    }
    println!(
        "Best for trucks: {:.1} km, score {:.2}",
        result.best_truck_route().distance_km(),
        result.best_truck_route().truck_suitability_score()
    );

    Ok(())
}

fn cell(value: Option<f64>, scale: f64) -> String {
    match value {
        Some(value) => format!("{:.1}", value / scale),
        None => String::from("-"),
    }
}

pub async fn matrix(args: MatrixArgs) -> anyhow::Result<()> {
    let analyzer = args.client.analyzer()?;
    let destinations = if args.destinations.is_empty() {
        args.origins.clone()
    } else {
        args.destinations
    };

    let result = analyzer
        .get_distance_matrix(&args.origins, &destinations)
        .await?;

    if args.client.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let mut header = vec![String::from("min / km")];
    header.extend(destinations.iter().map(|destination| destination.to_string()));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header);

    for (i, origin) in args.origins.iter().enumerate() {
        let mut row = vec![origin.to_string()];
        for j in 0..destinations.len() {
            row.push(format!(
                "{} / {}",
                cell(result.duration(i, j), 60.0),
                cell(result.distance(i, j), 1000.0)
            ));
        }
        table.add_row(row);
    }

    println!("{table}");
    Ok(())
}
