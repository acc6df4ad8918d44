// Topolab: Materializing declarative AS-level topologies into emulated networks
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use topolab::bridge::BridgePlan;
use topolab::config::TopologyConfig;
use topolab::frr;
use topolab::project::Project;
use topolab::runtime::{self, ApplyOptions, LinkMode};
use topolab::TopoError;

/// Materialize declarative AS-level topologies into emulated FRR networks.
#[derive(Debug, Parser)]
#[clap(name = "topolab", version)]
struct Cli {
    /// Print progress information to the error stream.
    #[clap(short, long, global = true)]
    verbose: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a network topology: generate the router configurations,
    /// create the containers and apply the links.
    Start(RunArgs),
    /// Stop a network topology: save the running configurations, stop the
    /// containers and remove the links.
    Stop(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// The topology description file.
    #[clap(short, long)]
    project: PathBuf,
    /// Restrict the operation to the given ASes.
    #[clap(long = "as", value_delimiter = ',')]
    as_filter: Vec<u32>,
    /// Restrict which links should be applied.
    #[clap(long, value_enum, default_value = "all")]
    links: LinkMode,
    /// Do not generate configuration files.
    #[clap(long)]
    no_generate: bool,
    /// Do not pull the docker images.
    #[clap(long)]
    no_pull: bool,
}

impl RunArgs {
    fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            links: self.links,
            as_filter: (!self.as_filter.is_empty()).then(|| self.as_filter.clone()),
            pull: !self.no_pull,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    pretty_env_logger::formatted_timed_builder()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Error
        })
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), TopoError> {
    match cli.command {
        Command::Start(args) => {
            let conf = TopologyConfig::load(&args.project)?;
            let project = Project::compile(&conf)?;

            if !args.no_generate {
                let configs = frr::generate(&project);
                frr::write_all(&project, &configs)?;
            }

            let plan = BridgePlan::build(&project);
            let opts = args.apply_options();
            block_on(runtime::start_all(&project, plan, &opts))??;
            Ok(())
        }
        Command::Stop(args) => {
            let conf = TopologyConfig::load(&args.project)?;
            let project = Project::compile(&conf)?;
            let opts = args.apply_options();
            block_on(runtime::stop_all(&project, &opts))??;
            Ok(())
        }
    }
}

fn block_on<F: std::future::Future>(fut: F) -> Result<F::Output, TopoError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(fut))
}
