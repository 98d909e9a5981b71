use std::path::PathBuf;

use clap::Subcommand;
use haulage_profile::{SegmentVerdict, TruckProfile, VehicleSpec, Way, lua};

use crate::parsers;

#[derive(Subcommand)]
pub enum ProfileSubcommands {
    /// Print the OSRM Lua profile used by osrm-extract
    Lua {
        /// JSON file with the truck dimensions
        #[arg(long, env = "HAULAGE_VEHICLE")]
        vehicle: Option<PathBuf>,

        /// Write to this file instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
    /// Evaluate the profile on one way given as OSM tags
    Eval {
        #[arg(long, env = "HAULAGE_VEHICLE")]
        vehicle: Option<PathBuf>,

        /// OSM tag as key=value, repeatable
        #[arg(long = "tag", short = 't', value_parser = parsers::parse_tag, required = true)]
        tags: Vec<(String, String)>,
    },
}

fn load_profile(vehicle: Option<PathBuf>) -> anyhow::Result<TruckProfile> {
    let vehicle = match vehicle {
        Some(path) => VehicleSpec::from_file(&path)?,
        None => VehicleSpec::default(),
    };
    Ok(TruckProfile::for_vehicle(vehicle))
}

pub fn run(subcommand: ProfileSubcommands) -> Result<(), anyhow::Error> {
    match subcommand {
        ProfileSubcommands::Lua { vehicle, out } => {
            let rendered = lua::render(&load_profile(vehicle)?);

            match out {
                Some(out) => {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, rendered)?;
                }
                None => print!("{rendered}"),
            }
        }
        ProfileSubcommands::Eval { vehicle, tags } => {
            let profile = load_profile(vehicle)?;
            let way: Way = tags.into_iter().collect();

            match profile.evaluate(&way) {
                SegmentVerdict::Passable(speeds) => println!(
                    "passable: forward {:.1} km/h, backward {:.1} km/h",
                    speeds.forward, speeds.backward
                ),
                SegmentVerdict::Excluded(exclusion) => println!("excluded: {exclusion}"),
            }
        }
    }

    Ok(())
}
