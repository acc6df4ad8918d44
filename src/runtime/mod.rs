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

//! Bringing a compiled project to life. Container tasks run concurrently;
//! a one-shot "links-ready" gate holds every task after creation until all
//! bridges are applied (intra-AS fabrics strictly before external ones),
//! then releases them to start their routing daemons. Task failures are
//! collected and reported at the end; sibling tasks keep running and no
//! rollback is attempted.

use std::process::Output;
use std::sync::Arc;

use clap::ValueEnum;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::bridge::{self, BridgeKind, BridgePlan};
use crate::project::{main_dir, Project};
use crate::types::AsId;

pub mod docker;
pub mod ovs;

pub use docker::{ContainerSpec, DockerRuntime};
pub use ovs::OvsDriver;

use docker::{DOCKER_HOST_IMAGE, DOCKER_ROUTER_IMAGE, DOCKER_RS_IMAGE};

/// Error thrown by the runtime layer.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A Docker API call failed.
    #[error("{0}")]
    Docker(#[from] bollard::errors::Error),
    /// A file operation failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// An external command failed.
    #[error("command `{cmd}` failed: {msg}")]
    Command {
        /// The command line.
        cmd: String,
        /// Its stderr (or exit status).
        msg: String,
    },
    /// A spawned task panicked or was cancelled.
    #[error("cannot join task: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// One or more apply tasks failed; their errors were logged.
    #[error("{failures} task(s) failed during apply")]
    ApplyFailed {
        /// Number of failed tasks.
        failures: usize,
    },
}

/// Which link fabrics to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LinkMode {
    /// Apply every fabric.
    #[default]
    All,
    /// Apply only intra-AS and host fabrics.
    Internal,
    /// Apply only inter-AS and IXP fabrics.
    External,
    /// Apply no fabric at all.
    None,
}

/// Options of the start and stop workflows.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Which fabrics to apply.
    pub links: LinkMode,
    /// Restrict to these ASes (IXPs are always included).
    pub as_filter: Option<Vec<u32>>,
    /// Pull the images before starting.
    pub pull: bool,
}

impl ApplyOptions {
    fn selects(&self, asn: AsId) -> bool {
        match &self.as_filter {
            Some(filter) => filter.contains(&asn.0),
            None => true,
        }
    }
}

/// Run an external command, returning its stdout.
pub(crate) async fn run_command(program: &str, args: &[&str]) -> Result<String, RuntimeError> {
    let output: Output = tokio::process::Command::new(program).args(args).output().await?;
    if !output.status.success() {
        return Err(RuntimeError::Command {
            cmd: format!("{program} {}", args.join(" ")),
            msg: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// The container specs of every router, customer, host and route server of
/// the project (honoring the AS filter).
fn container_specs(project: &Project, opts: &ApplyOptions) -> Vec<ContainerSpec> {
    let mut specs = Vec::new();
    for (asn, asys) in &project.ases {
        if !opts.selects(*asn) {
            continue;
        }
        for router in &asys.routers {
            specs.push(ContainerSpec {
                name: router.container_name.clone(),
                hostname: router.hostname.clone(),
                image: router
                    .custom_image
                    .clone()
                    .unwrap_or_else(|| DOCKER_ROUTER_IMAGE.to_string()),
                config_path: Some(project.router_config_path(*asn, &router.hostname)),
            });
        }
        for vpn in &asys.vpns {
            for cust in &vpn.customers {
                specs.push(ContainerSpec {
                    name: cust.router.container_name.clone(),
                    hostname: cust.router.hostname.clone(),
                    image: cust
                        .router
                        .custom_image
                        .clone()
                        .unwrap_or_else(|| DOCKER_ROUTER_IMAGE.to_string()),
                    config_path: Some(project.customer_config_path(&cust.router.hostname)),
                });
            }
        }
        for host in &asys.hosts {
            specs.push(ContainerSpec {
                name: host.container_name.clone(),
                hostname: host.hostname.clone(),
                image: host.image.clone().unwrap_or_else(|| DOCKER_HOST_IMAGE.to_string()),
                config_path: None,
            });
        }
    }
    for ixp in &project.ixps {
        specs.push(ContainerSpec {
            name: ixp.route_server.container_name.clone(),
            hostname: ixp.route_server.hostname.clone(),
            image: DOCKER_RS_IMAGE.to_string(),
            config_path: Some(
                project.router_config_path(ixp.asn, &ixp.route_server.hostname),
            ),
        });
    }
    specs
}

/// Start every container, apply the requested link fabrics, and release
/// the containers to start their routing daemons. Returns the plan with
/// the host-side interface names filled in.
pub async fn start_all(
    project: &Project,
    mut plan: BridgePlan,
    opts: &ApplyOptions,
) -> Result<BridgePlan, RuntimeError> {
    let docker = Arc::new(DockerRuntime::new()?);
    if opts.pull {
        docker.pull_images().await?;
    }

    let specs = container_specs(project, opts);
    let (created_tx, mut created_rx) = mpsc::channel::<()>(specs.len().max(1));
    let (gate_tx, gate_rx) = watch::channel(false);

    let mut handles: Vec<JoinHandle<Result<(), RuntimeError>>> = Vec::new();
    for spec in specs {
        let docker = docker.clone();
        let created = created_tx.clone();
        let mut gate = gate_rx.clone();
        handles.push(tokio::spawn(async move {
            let res = docker.ensure_running(&spec).await;
            // signal creation even on failure, the coordinator counts all
            let _ = created.send(()).await;
            drop(created);
            res?;

            // wait until the links are applied
            while !*gate.borrow_and_update() {
                if gate.changed().await.is_err() {
                    break;
                }
            }

            if spec.config_path.is_some() {
                docker.start_frr(&spec.name).await?;
            }
            Ok(())
        }));
    }
    drop(created_tx);

    // wait for every container to exist before wiring them up
    while created_rx.recv().await.is_some() {}

    log::info!("applying links with OVS...");
    let driver = OvsDriver::new();
    // intra-AS fabrics must exist before cross-AS attachment
    match opts.links {
        LinkMode::Internal => {
            apply_fabric(project, &driver, &mut plan, BridgeKind::Internal).await?;
            apply_fabric(project, &driver, &mut plan, BridgeKind::Host).await?;
        }
        LinkMode::External => {
            apply_fabric(project, &driver, &mut plan, BridgeKind::External).await?;
            apply_fabric(project, &driver, &mut plan, BridgeKind::Ixp).await?;
        }
        LinkMode::None => {}
        LinkMode::All => {
            apply_fabric(project, &driver, &mut plan, BridgeKind::Internal).await?;
            apply_fabric(project, &driver, &mut plan, BridgeKind::Host).await?;
            apply_fabric(project, &driver, &mut plan, BridgeKind::External).await?;
            apply_fabric(project, &driver, &mut plan, BridgeKind::Ixp).await?;
        }
    }

    // open the gate: every task continues with its daemon start
    let _ = gate_tx.send(true);

    let mut failures = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("apply task failed: {e}");
                failures += 1;
            }
            Err(e) => {
                log::error!("apply task panicked: {e}");
                failures += 1;
            }
        }
    }

    save_links(project, &plan)?;

    if failures > 0 {
        Err(RuntimeError::ApplyFailed { failures })
    } else {
        Ok(plan)
    }
}

/// Create the bridges of one fabric kind, attach its planned ports, and
/// install the cross-connect flows of intra-AS fabrics.
async fn apply_fabric(
    project: &Project,
    driver: &OvsDriver,
    plan: &mut BridgePlan,
    kind: BridgeKind,
) -> Result<(), RuntimeError> {
    for bridge in plan.bridges_of(kind) {
        driver.create_bridge(&bridge).await?;
    }

    for (container, records) in plan.0.iter_mut() {
        for record in records.iter_mut().filter(|r| r.kind == kind) {
            driver.attach(container, record).await?;
        }
    }

    if kind == BridgeKind::Internal {
        for (asn, asys) in &project.ases {
            let bridge = bridge::internal_bridge(*asn);
            for (port_a, port_b) in bridge::flows_of(project, &asys.links, plan) {
                driver.add_flow(&bridge, port_a, port_b).await?;
            }
        }
    }
    Ok(())
}

/// Save the current configurations out of the containers, stop them, and
/// tear every bridge down (a no-op for bridges that were never applied).
pub async fn stop_all(project: &Project, opts: &ApplyOptions) -> Result<(), RuntimeError> {
    let docker = Arc::new(DockerRuntime::new()?);
    let specs = container_specs(project, opts);

    let mut handles: Vec<JoinHandle<Result<(), RuntimeError>>> = Vec::new();
    for spec in specs {
        let docker = docker.clone();
        handles.push(tokio::spawn(async move { docker.save_and_stop(&spec).await }));
    }

    let mut failures = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("stop task failed: {e}");
                failures += 1;
            }
            Err(e) => {
                log::error!("stop task panicked: {e}");
                failures += 1;
            }
        }
    }

    let driver = OvsDriver::new();
    let plan = BridgePlan::build(project);
    for kind in [BridgeKind::Internal, BridgeKind::Host, BridgeKind::External, BridgeKind::Ixp] {
        for bridge in plan.bridges_of(kind) {
            driver.delete_bridge(&bridge).await?;
        }
    }

    match std::fs::remove_file(main_dir().join("links.json")) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if failures > 0 {
        Err(RuntimeError::ApplyFailed { failures })
    } else {
        Ok(())
    }
}

/// Persist the plan as `links.json`, once in the project directory and
/// once in the main tool directory for reuse on restart.
fn save_links(project: &Project, plan: &BridgePlan) -> Result<(), RuntimeError> {
    plan.save(&main_dir())?;
    plan.save(&project.config_dir())?;
    Ok(())
}
