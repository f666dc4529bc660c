//! Physical signal path resolution across chained cables.
//!
//! A walk starts at a module, crate or cable, enters the first cable on the
//! requested side and follows each cable type's internal routing to the
//! opposite face. Connections on that face lead either to the next cable
//! (entered through its mirrored connection) or to a terminal module/crate.
//!
//! Walking from `detSide` uses routing keys (detSide port to crateSide port);
//! walking from `crateSide` uses the reverse lookup.

use crate::core::graph::{ConnectivityGraph, Entity, TemplateCatalog};
use crate::domain::model::{Cable, CablingPath, PeerKind, Port, Side, StopReason};
use crate::domain::ports::EntityStore;
use crate::utils::error::{InventoryError, Result};
use std::sync::Arc;

/// Where a walk enters the cable graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StartingPoint {
    pub name: String,
    pub cable: Cable,
    pub port: Port,
}

pub struct PathResolver<S: EntityStore> {
    graph: ConnectivityGraph<S>,
}

impl<S: EntityStore> PathResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            graph: ConnectivityGraph::new(store),
        }
    }

    /// Resolves `name` and walks to the far end of its cable chain.
    pub async fn resolve(
        &self,
        name: &str,
        side: Side,
        requested_port: Option<Port>,
        category: Option<PeerKind>,
    ) -> Result<CablingPath> {
        let start = self
            .resolve_starting_cable(name, side, requested_port, category)
            .await?;
        let templates = self.graph.templates().await?;
        let result = self
            .traverse(&start.name, start.cable, side, start.port, &templates)
            .await?;

        match &result.stop {
            None => tracing::info!("🧭 Path from {} ({}): {}", name, side, result.path.join(" -> ")),
            Some(reason) => tracing::warn!(
                "🧭 Incomplete path from {} ({}): {} [{:?}]",
                name,
                side,
                result.path.join(" -> "),
                reason
            ),
        }
        Ok(result)
    }

    /// Finds the cable and port a walk starts from.
    ///
    /// Without an explicit category the namespaces are searched in the order
    /// module, crate, cable and the first match wins. Modules and crates start
    /// at the port of their own connection on `side`, ignoring
    /// `requested_port`; cables start at `requested_port` (default 1).
    pub async fn resolve_starting_cable(
        &self,
        name: &str,
        side: Side,
        requested_port: Option<Port>,
        category: Option<PeerKind>,
    ) -> Result<StartingPoint> {
        let kinds: &[PeerKind] = match &category {
            Some(kind) => std::slice::from_ref(kind),
            None => &[PeerKind::Module, PeerKind::Crate, PeerKind::Cable],
        };

        let mut found = None;
        for kind in kinds {
            if let Some(entity) = self.graph.entity(*kind, name).await? {
                found = Some(entity);
                break;
            }
        }
        let entity = found.ok_or_else(|| InventoryError::StartingPointNotFound {
            name: name.to_string(),
        })?;

        let cable_name = match &entity {
            Entity::Cable(cable) => {
                return Ok(StartingPoint {
                    name: name.to_string(),
                    cable: cable.clone(),
                    port: requested_port.unwrap_or_default(),
                });
            }
            Entity::Module(module) => module.connected_to.as_deref(),
            Entity::Crate(crate_) => crate_.connected_to.as_deref(),
        };

        let not_attached = || InventoryError::EndpointNotAttached {
            endpoint: name.to_string(),
            side,
        };
        let cable_name = cable_name.ok_or_else(not_attached)?;
        let cable = self.graph.cable(cable_name).await?.ok_or_else(|| {
            InventoryError::ConnectedCableNotFound {
                cable: cable_name.to_string(),
            }
        })?;

        let port = cable
            .connection_to(side, entity.kind(), entity.identity())
            .map(|c| c.port)
            .ok_or_else(not_attached)?;

        tracing::debug!("Starting at {} port {} ({})", cable.name, port, side);
        Ok(StartingPoint {
            name: name.to_string(),
            cable,
            port,
        })
    }

    /// Walks from `start_cable`/`start_port` until a module or crate is
    /// reached or the chain breaks off. Fails with `CycleDetected` once more
    /// hops were taken than there are cables.
    pub async fn traverse(
        &self,
        start_name: &str,
        start_cable: Cable,
        side: Side,
        start_port: Port,
        templates: &TemplateCatalog,
    ) -> Result<CablingPath> {
        let other_side = side.opposite();
        let max_hops = self.graph.cable_count().await? + 1;

        let mut path = vec![start_name.to_string()];
        let mut current = start_cable;
        let mut port = start_port;
        let mut hops = 0usize;

        loop {
            if hops > max_hops {
                return Err(InventoryError::CycleDetected { hops });
            }

            if current.name != path[0] {
                path.push(current.name.clone());
            }

            let Some(template) = templates.get(&current.cable_type) else {
                let reason = match templates.unreadable(&current.cable_type) {
                    Some(message) => StopReason::TemplateUnreadable {
                        cable: current.name.clone(),
                        cable_type: current.cable_type.clone(),
                        message: message.to_string(),
                    },
                    None => StopReason::TemplateNotFound {
                        cable: current.name.clone(),
                        cable_type: current.cable_type.clone(),
                    },
                };
                return Ok(CablingPath::incomplete(path, reason));
            };

            let routed = match side {
                Side::DetSide => template.internal_routing.forward(port),
                Side::CrateSide => template.internal_routing.reverse(port),
            };
            let next_port = match routed {
                Ok(Some(next)) => next,
                Ok(None) => {
                    return Ok(CablingPath::incomplete(
                        path,
                        StopReason::NoRoute {
                            cable: current.name.clone(),
                            port,
                        },
                    ))
                }
                Err(ambiguous) => {
                    return Ok(CablingPath::incomplete(
                        path,
                        StopReason::AmbiguousRouting {
                            cable: current.name.clone(),
                            port,
                            candidates: ambiguous.candidates,
                        },
                    ))
                }
            };

            let Some(connection) = current.connection_at(other_side, next_port) else {
                return Ok(CablingPath::incomplete(
                    path,
                    StopReason::Unconnected {
                        cable: current.name.clone(),
                        side: other_side,
                        port: next_port,
                    },
                ));
            };

            let dangling = || StopReason::DanglingReference {
                cable: current.name.clone(),
                target: connection.connected_to.clone(),
                peer_type: connection.peer_type,
            };

            // The connection's own peerType picks the namespace, not the walk direction.
            let next = match self
                .graph
                .entity(connection.peer_type, &connection.connected_to)
                .await?
            {
                None => return Ok(CablingPath::incomplete(path, dangling())),
                Some(Entity::Cable(next)) => next,
                Some(endpoint) => {
                    path.push(endpoint.identity().to_string());
                    return Ok(CablingPath::complete(path));
                }
            };

            // Enter the next cable through the connection that points back.
            let Some(entry) = next.connection_to(side, PeerKind::Cable, &current.name) else {
                return Ok(CablingPath::incomplete(
                    path,
                    StopReason::MissingMirror {
                        cable: next.name.clone(),
                        peer: current.name.clone(),
                    },
                ));
            };

            tracing::debug!(
                "Hop {}: {} port {} -> {} port {}",
                hops + 1,
                current.name,
                next_port,
                next.name,
                entry.port
            );
            port = entry.port;
            current = next;
            hops += 1;
        }
    }
}
