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

//! The switch-driver collaborator. Bridges are Open vSwitch instances; a
//! port attach creates a veth pair, plugs one end into the bridge with the
//! planned OpenFlow port number, and moves the other end into the
//! container's network namespace under its planned interface name.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::bridge::PortRecord;

use super::{run_command, RuntimeError};

/// Driver for the Open vSwitch fabric.
#[derive(Debug, Clone, Default)]
pub struct OvsDriver;

impl OvsDriver {
    /// Create the driver.
    pub fn new() -> Self {
        Self
    }

    /// Create a bridge; creating an existing bridge is a no-op.
    pub async fn create_bridge(&self, name: &str) -> Result<(), RuntimeError> {
        run_command("ovs-vsctl", &["--may-exist", "add-br", name]).await?;
        Ok(())
    }

    /// Delete a bridge; deleting an absent bridge is a no-op.
    pub async fn delete_bridge(&self, name: &str) -> Result<(), RuntimeError> {
        run_command("ovs-vsctl", &["--if-exists", "del-br", name]).await?;
        Ok(())
    }

    /// Attach one planned port to its bridge and container. Fills in the
    /// host-side interface name of the record.
    pub async fn attach(
        &self,
        container: &str,
        record: &mut PortRecord,
    ) -> Result<(), RuntimeError> {
        let host_if = host_ifname(container, &record.ifname);
        let peer_if = format!("{host_if}c");
        let pid = container_pid(container).await?;

        run_command(
            "ip",
            &["link", "add", &host_if, "type", "veth", "peer", "name", &peer_if],
        )
        .await?;
        run_command(
            "ovs-vsctl",
            &[
                "add-port",
                &record.bridge,
                &host_if,
                "--",
                "set",
                "interface",
                &host_if,
                &format!("ofport_request={}", record.of_port),
            ],
        )
        .await?;
        run_command("ip", &["link", "set", &host_if, "up"]).await?;
        run_command(
            "ip",
            &["link", "set", &peer_if, "netns", &pid, "name", &record.ifname],
        )
        .await?;
        in_netns(&pid, &["ip", "link", "set", &record.ifname, "up"]).await?;

        if let Some(vrf) = &record.vrf {
            let table = vrf_table(vrf).to_string();
            // the device may already exist from an earlier attach
            let _ = in_netns(&pid, &["ip", "link", "add", vrf, "type", "vrf", "table", &table])
                .await;
            in_netns(&pid, &["ip", "link", "set", vrf, "up"]).await?;
            in_netns(&pid, &["ip", "link", "set", &record.ifname, "master", vrf]).await?;
        }
        if let Some(ip) = &record.ip {
            in_netns(&pid, &["ip", "addr", "add", &ip.to_string(), "dev", &record.ifname])
                .await?;
        }
        for route in &record.routes {
            in_netns(
                &pid,
                &[
                    "ip",
                    "route",
                    "add",
                    &route.prefix.to_string(),
                    "via",
                    &route.via.to_string(),
                    "dev",
                    &route.ifname,
                ],
            )
            .await?;
        }
        if record.speed > 0 {
            run_command(
                "ovs-vsctl",
                &[
                    "set",
                    "interface",
                    &host_if,
                    &format!("ingress_policing_rate={}", record.speed * 1000),
                ],
            )
            .await?;
        }

        record.host_ifname = Some(host_if);
        Ok(())
    }

    /// Attach every record of a plan slice in order.
    pub async fn bulk_attach<'a>(
        &self,
        records: impl Iterator<Item = (&'a str, &'a mut PortRecord)>,
    ) -> Result<(), RuntimeError> {
        for (container, record) in records {
            self.attach(container, record).await?;
        }
        Ok(())
    }

    /// Install the cross-connect flow pair of one link.
    pub async fn add_flow(
        &self,
        bridge: &str,
        port_a: u32,
        port_b: u32,
    ) -> Result<(), RuntimeError> {
        run_command(
            "ovs-ofctl",
            &["add-flow", bridge, &format!("in_port={port_a},actions=output:{port_b}")],
        )
        .await?;
        run_command(
            "ovs-ofctl",
            &["add-flow", bridge, &format!("in_port={port_b},actions=output:{port_a}")],
        )
        .await?;
        Ok(())
    }
}

/// The deterministic host-side name of a veth end. Interface names are
/// limited to 15 characters, so the pair is addressed by a hash.
pub fn host_ifname(container: &str, ifname: &str) -> String {
    let mut hasher = DefaultHasher::new();
    container.hash(&mut hasher);
    ifname.hash(&mut hasher);
    format!("tl-{:08x}", hasher.finish() as u32)
}

/// The routing table backing a VRF device, derived from its name.
fn vrf_table(vrf: &str) -> u32 {
    let mut hasher = DefaultHasher::new();
    vrf.hash(&mut hasher);
    1000 + (hasher.finish() % 1000) as u32
}

async fn container_pid(container: &str) -> Result<String, RuntimeError> {
    let out = run_command(
        "docker",
        &["inspect", "--format", "{{.State.Pid}}", container],
    )
    .await?;
    Ok(out.trim().to_string())
}

async fn in_netns(pid: &str, cmd: &[&str]) -> Result<String, RuntimeError> {
    let mut args = vec!["-t", pid, "-n"];
    args.extend_from_slice(cmd);
    run_command("nsenter", &args).await
}
