use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Raw JSON document as held by the entity store.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A value paired with the store revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub revision: u64,
    pub value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Modules,
    Crates,
    Cables,
    CableTemplates,
    Tests,
    Logbook,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Modules,
        Collection::Crates,
        Collection::Cables,
        Collection::CableTemplates,
        Collection::Tests,
        Collection::Logbook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Modules => "modules",
            Collection::Crates => "crates",
            Collection::Cables => "cables",
            Collection::CableTemplates => "cable_templates",
            Collection::Tests => "tests",
            Collection::Logbook => "logbook",
        }
    }

    /// Field holding the domain identity of every document in the collection.
    pub fn key_field(&self) -> &'static str {
        match self {
            Collection::Modules => "moduleID",
            Collection::Crates | Collection::Cables => "name",
            Collection::CableTemplates => "type",
            Collection::Tests => "testID",
            Collection::Logbook => "timestamp",
        }
    }

    /// Word used in API messages ("Module inserted", "Log not found", ...).
    pub fn noun(&self) -> &'static str {
        match self {
            Collection::Modules => "Module",
            Collection::Logbook => "Log",
            Collection::CableTemplates => "Template",
            Collection::Crates | Collection::Cables | Collection::Tests => "Entry",
        }
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown collection: {}", s))
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connector face of a cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "detSide")]
    DetSide,
    #[serde(rename = "crateSide")]
    CrateSide,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::DetSide => Side::CrateSide,
            Side::CrateSide => Side::DetSide,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::DetSide => "detSide",
            Side::CrateSide => "crateSide",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detSide" => Ok(Side::DetSide),
            "crateSide" => Ok(Side::CrateSide),
            other => Err(format!(
                "unknown side '{}', expected detSide or crateSide",
                other
            )),
        }
    }
}

/// Namespace a connection reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerKind {
    Module,
    Crate,
    Cable,
}

impl PeerKind {
    pub fn collection(&self) -> Collection {
        match self {
            PeerKind::Module => Collection::Modules,
            PeerKind::Crate => Collection::Crates,
            PeerKind::Cable => Collection::Cables,
        }
    }
}

impl FromStr for PeerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "module" => Ok(PeerKind::Module),
            "crate" => Ok(PeerKind::Crate),
            "cable" => Ok(PeerKind::Cable),
            other => Err(format!("unknown peer type: {}", other)),
        }
    }
}

/// Positive port number. Accepts integers and numeric strings on input and
/// always serializes as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Port(u32);

impl Port {
    pub fn new(value: u32) -> Option<Port> {
        (value > 0).then_some(Port(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Port {
    fn default() -> Self {
        Port(1)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for Port {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .ok()
            .and_then(Port::new)
            .ok_or_else(|| format!("invalid port {}: must be a positive integer", value))
    }
}

impl FromStr for Port {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid port '{}': not a number", s))?;
        Port::try_from(value)
    }
}

impl<'de> Deserialize<'de> for Port {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Port::try_from(n).map_err(de::Error::custom),
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

/// One physical link record on one side of a cable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub port: Port,
    #[serde(rename = "connectedTo")]
    pub connected_to: String,
    #[serde(rename = "peerType", alias = "type")]
    pub peer_type: PeerKind,
}

impl Connection {
    pub fn to_cable(port: Port, cable: impl Into<String>) -> Self {
        Self {
            port,
            connected_to: cable.into(),
            peer_type: PeerKind::Cable,
        }
    }

    pub fn points_to(&self, kind: PeerKind, id: &str) -> bool {
        self.peer_type == kind && self.connected_to == id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(rename = "moduleID")]
    pub module_id: String,
    #[serde(rename = "connectedTo", default, skip_serializing_if = "Option::is_none")]
    pub connected_to: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crate {
    pub name: String,
    #[serde(rename = "connectedTo", default, skip_serializing_if = "Option::is_none")]
    pub connected_to: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cable {
    pub name: String,
    #[serde(rename = "type")]
    pub cable_type: String,
    #[serde(rename = "detSide", default)]
    pub det_side: Vec<Connection>,
    #[serde(rename = "crateSide", default)]
    pub crate_side: Vec<Connection>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Cable {
    pub fn side(&self, side: Side) -> &[Connection] {
        match side {
            Side::DetSide => &self.det_side,
            Side::CrateSide => &self.crate_side,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Vec<Connection> {
        match side {
            Side::DetSide => &mut self.det_side,
            Side::CrateSide => &mut self.crate_side,
        }
    }

    pub fn connection_at(&self, side: Side, port: Port) -> Option<&Connection> {
        self.side(side).iter().find(|c| c.port == port)
    }

    pub fn connection_to(&self, side: Side, kind: PeerKind, id: &str) -> Option<&Connection> {
        self.side(side).iter().find(|c| c.points_to(kind, id))
    }
}

/// Onward port(s) for one routing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Route {
    Single(Port),
    Fanout(Vec<Port>),
}

impl Route {
    fn contains(&self, port: Port) -> bool {
        match self {
            Route::Single(p) => *p == port,
            Route::Fanout(ports) => ports.contains(&port),
        }
    }
}

/// A routing lookup matched more than one onward port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousRoute {
    pub candidates: Vec<Port>,
}

/// Internal port map of a cable type, keyed by detSide port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Route>",
    into = "BTreeMap<String, Route>"
)]
pub struct RoutingTable(BTreeMap<Port, Route>);

impl RoutingTable {
    pub fn new(entries: impl IntoIterator<Item = (Port, Route)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// detSide port to crateSide port. A breakout with more than one target
    /// cannot pick a single onward port.
    pub fn forward(&self, port: Port) -> Result<Option<Port>, AmbiguousRoute> {
        match self.0.get(&port) {
            None => Ok(None),
            Some(Route::Single(p)) => Ok(Some(*p)),
            Some(Route::Fanout(ports)) => match ports.as_slice() {
                [] => Ok(None),
                [only] => Ok(Some(*only)),
                many => Err(AmbiguousRoute {
                    candidates: many.to_vec(),
                }),
            },
        }
    }

    /// crateSide port back to the detSide port routed onto it. A port that
    /// is a member of exactly one breakout list resolves to that list's key.
    pub fn reverse(&self, port: Port) -> Result<Option<Port>, AmbiguousRoute> {
        let keys: Vec<Port> = self
            .0
            .iter()
            .filter(|(_, route)| route.contains(port))
            .map(|(key, _)| *key)
            .collect();
        match keys.as_slice() {
            [] => Ok(None),
            [key] => Ok(Some(*key)),
            _ => Err(AmbiguousRoute { candidates: keys }),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Route>> for RoutingTable {
    type Error = String;

    fn try_from(raw: BTreeMap<String, Route>) -> Result<Self, Self::Error> {
        raw.into_iter()
            .map(|(key, route)| Ok((key.parse::<Port>()?, route)))
            .collect::<Result<BTreeMap<_, _>, String>>()
            .map(RoutingTable)
    }
}

impl From<RoutingTable> for BTreeMap<String, Route> {
    fn from(table: RoutingTable) -> Self {
        table
            .0
            .into_iter()
            .map(|(port, route)| (port.to_string(), route))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CableTemplate {
    #[serde(rename = "type")]
    pub cable_type: String,
    #[serde(rename = "internalRouting")]
    pub internal_routing: RoutingTable,
    #[serde(flatten)]
    pub extra: Document,
}

/// Endpoint of a mirrored cable-to-cable link as sent by API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CableLink {
    pub cable1_name: String,
    pub cable1_port: Port,
    pub cable1_side: Side,
    pub cable2_name: String,
    pub cable2_port: Port,
}

impl CableLink {
    pub fn cable2_side(&self) -> Side {
        self.cable1_side.opposite()
    }
}

/// Why a walk stopped before reaching a module or crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StopReason {
    TemplateNotFound { cable: String, cable_type: String },
    TemplateUnreadable { cable: String, cable_type: String, message: String },
    AmbiguousRouting { cable: String, port: Port, candidates: Vec<Port> },
    NoRoute { cable: String, port: Port },
    Unconnected { cable: String, side: Side, port: Port },
    DanglingReference { cable: String, target: String, peer_type: PeerKind },
    MissingMirror { cable: String, peer: String },
}

/// Ordered names along one physical route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CablingPath {
    pub path: Vec<String>,
    pub stop: Option<StopReason>,
}

impl CablingPath {
    pub fn complete(path: Vec<String>) -> Self {
        Self { path, stop: None }
    }

    pub fn incomplete(path: Vec<String>, reason: StopReason) -> Self {
        Self {
            path,
            stop: Some(reason),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stop.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn port(n: u32) -> Port {
        Port::new(n).unwrap()
    }

    #[test]
    fn test_port_accepts_numbers_and_numeric_strings() {
        let from_int: Port = serde_json::from_value(json!(7)).unwrap();
        let from_str: Port = serde_json::from_value(json!("7")).unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(serde_json::to_value(from_str).unwrap(), json!(7));

        assert!(serde_json::from_value::<Port>(json!(0)).is_err());
        assert!(serde_json::from_value::<Port>(json!("abc")).is_err());
        assert!(serde_json::from_value::<Port>(json!(-3)).is_err());
    }

    #[test]
    fn test_connection_accepts_legacy_type_key() {
        let conn: Connection = serde_json::from_value(json!({
            "port": "2",
            "connectedTo": "Cable 4",
            "type": "cable"
        }))
        .unwrap();
        assert_eq!(conn, Connection::to_cable(port(2), "Cable 4"));

        let out = serde_json::to_value(&conn).unwrap();
        assert_eq!(out["peerType"], "cable");
        assert_eq!(out["port"], 2);
    }

    #[test]
    fn test_cable_keeps_extra_attributes() {
        let doc = json!({
            "name": "Cable 3",
            "type": "extfib",
            "detSide": [],
            "crateSide": [],
            "length_m": 12
        });
        let cable: Cable = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(cable.extra.get("length_m"), Some(&json!(12)));
        assert_eq!(serde_json::to_value(&cable).unwrap(), doc);
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::DetSide.opposite(), Side::CrateSide);
        assert_eq!(Side::CrateSide.opposite(), Side::DetSide);
        assert_eq!("crateSide".parse::<Side>().unwrap(), Side::CrateSide);
        assert!("leftSide".parse::<Side>().is_err());
    }

    #[test]
    fn test_routing_table_normalizes_string_keys() {
        let table: RoutingTable =
            serde_json::from_value(json!({"1": 3, "2": [6], "10": [1, 2]})).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.forward(port(1)), Ok(Some(port(3))));
        assert_eq!(table.forward(port(2)), Ok(Some(port(6))));
        assert_eq!(table.forward(port(4)), Ok(None));
        assert_eq!(
            serde_json::to_value(&table).unwrap(),
            json!({"1": 3, "10": [1, 2], "2": [6]})
        );

        assert!(serde_json::from_value::<RoutingTable>(json!({"x": 1})).is_err());
    }

    #[test]
    fn test_forward_fanout_is_ambiguous() {
        let table = RoutingTable::new([(port(1), Route::Fanout(vec![port(1), port(2)]))]);
        let err = table.forward(port(1)).unwrap_err();
        assert_eq!(err.candidates, vec![port(1), port(2)]);
    }

    #[test]
    fn test_reverse_lookup() {
        let exapus = RoutingTable::new([
            (port(1), Route::Fanout(vec![port(1), port(2)])),
            (port(2), Route::Fanout(vec![port(3), port(4)])),
        ]);
        assert_eq!(exapus.reverse(port(4)), Ok(Some(port(2))));
        assert_eq!(exapus.reverse(port(9)), Ok(None));

        let clashing = RoutingTable::new([
            (port(1), Route::Single(port(5))),
            (port(2), Route::Single(port(5))),
        ]);
        assert!(clashing.reverse(port(5)).is_err());
    }

    #[test]
    fn test_stop_reason_serialization() {
        let reason = StopReason::TemplateNotFound {
            cable: "Cable 9".to_string(),
            cable_type: "mystery".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&reason).unwrap(),
            json!({"kind": "templateNotFound", "cable": "Cable 9", "cableType": "mystery"})
        );
    }
}
