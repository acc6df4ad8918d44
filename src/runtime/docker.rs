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

//! The container-runtime collaborator. Containers are created through the
//! Docker API with networking disabled (the switch driver wires them up),
//! and configuration files move in and out with `docker cp`, the same way
//! the routing daemon is (re)started with `docker exec`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;

use super::{run_command, RuntimeError};

/// Default image of router containers.
pub const DOCKER_ROUTER_IMAGE: &str = "topolab/frr";
/// Default image of IXP route-server containers.
pub const DOCKER_RS_IMAGE: &str = "topolab/routeserver";
/// Default image of host containers.
pub const DOCKER_HOST_IMAGE: &str = "topolab/host";

/// Location of the FRR configuration inside a container.
pub const FRR_CONF_PATH: &str = "/etc/frr/frr.conf";
/// Init script bringing up the routing daemon inside a container.
pub const FRR_INIT: &str = "/usr/lib/frr/frrinit.sh";

/// Everything needed to create and start one container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// The container name.
    pub name: String,
    /// The hostname inside the container.
    pub hostname: String,
    /// The image to run.
    pub image: String,
    /// The router configuration to copy in, if the container runs FRR.
    pub config_path: Option<PathBuf>,
}

/// Handle to the Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self, RuntimeError> {
        Ok(Self { docker: Docker::connect_with_socket_defaults()? })
    }

    /// Create the container if it does not exist yet (an existing container
    /// with the target name is reused), copy the configuration in, and
    /// start it. Starting an already running container is a no-op.
    pub async fn ensure_running(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        let id = match self.find_container(&spec.name).await? {
            Some(id) => id,
            None => {
                let options = CreateContainerOptions { name: spec.name.as_str(), platform: None };
                let config = Config {
                    image: Some(spec.image.as_str()),
                    hostname: Some(spec.hostname.as_str()),
                    // docker networking disabled, the switch driver wires the container
                    network_disabled: Some(true),
                    host_config: Some(HostConfig {
                        cap_add: Some(vec!["SYS_ADMIN".to_string(), "NET_ADMIN".to_string()]),
                        ..Default::default()
                    }),
                    ..Default::default()
                };
                self.docker.create_container(Some(options), config).await?.id
            }
        };

        if let Some(config_path) = &spec.config_path {
            self.copy_config_in(&spec.name, config_path).await?;
        }

        // 304: the container is already running
        match self
            .docker
            .start_container(&id, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(())
            | Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {}
            Err(e) => return Err(e.into()),
        }
        log::debug!("{} started", spec.name);
        Ok(())
    }

    /// Save the running configuration (if the container runs FRR) and stop
    /// the container.
    pub async fn save_and_stop(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        if let Some(config_path) = &spec.config_path {
            self.copy_config_out(&spec.name, config_path).await?;
        }
        // 304: the container is already stopped
        match self
            .docker
            .stop_container(&spec.name, None::<StopContainerOptions>)
            .await
        {
            Ok(())
            | Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {}
            Err(e) => return Err(e.into()),
        }
        log::debug!("{} stopped", spec.name);
        Ok(())
    }

    /// The ID of the container with the given name, if it exists.
    pub async fn find_container(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        let filters = HashMap::from([("name".to_string(), vec![name.to_string()])]);
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions { all: true, filters, ..Default::default() }))
            .await?;
        Ok(containers.into_iter().find_map(|c| c.id))
    }

    /// Copy a configuration file to [`FRR_CONF_PATH`] inside the container.
    pub async fn copy_config_in(&self, name: &str, path: &Path) -> Result<(), RuntimeError> {
        run_command(
            "docker",
            &["cp", &path.display().to_string(), &format!("{name}:{FRR_CONF_PATH}")],
        )
        .await?;
        Ok(())
    }

    /// Copy [`FRR_CONF_PATH`] out of the container back to the
    /// configuration directory.
    pub async fn copy_config_out(&self, name: &str, path: &Path) -> Result<(), RuntimeError> {
        run_command(
            "docker",
            &["cp", &format!("{name}:{FRR_CONF_PATH}"), &path.display().to_string()],
        )
        .await?;
        Ok(())
    }

    /// Launch the routing daemon inside the container.
    pub async fn start_frr(&self, name: &str) -> Result<(), RuntimeError> {
        run_command("docker", &["exec", name, FRR_INIT, "start"]).await?;
        Ok(())
    }

    /// Reload the configuration of a running daemon.
    pub async fn reload_frr(&self, name: &str) -> Result<(), RuntimeError> {
        run_command("docker", &["exec", name, "vtysh", "-b"]).await?;
        Ok(())
    }

    /// Pull the latest router and route-server images.
    pub async fn pull_images(&self) -> Result<(), RuntimeError> {
        for image in [DOCKER_ROUTER_IMAGE, DOCKER_RS_IMAGE] {
            log::info!("pulling {image}...");
            run_command("docker", &["pull", image]).await?;
        }
        Ok(())
    }
}
