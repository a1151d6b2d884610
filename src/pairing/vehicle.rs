//! Paired vehicle records
//!
//! Each successful pairing produces a [`Vehicle`] record. The daemon keeps
//! them in a [`VehicleRegistry`] persisted as a JSON list, so one companion
//! can hold credentials for several head units and pick the right one by
//! identifier or network name.

use crate::error::CompanionError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum number of vehicles a registry will hold
pub const MAX_VEHICLES: usize = 20;

/// Length of generated vehicle identifiers
const VEHICLE_ID_LEN: usize = 8;

/// Generate a fresh 8-character lowercase hex vehicle identifier.
pub fn random_vehicle_id() -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..VEHICLE_ID_LEN)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}

fn default_socks5_enabled() -> bool {
    true
}

/// A paired vehicle and its credentials
///
/// Decoding is tolerant: `id`, `name` and `socks5_enabled` fall back to a
/// fresh identifier, the SSID and `true` respectively. `ssid` and
/// `shared_secret` are mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Stable identifier, 8 lowercase hex characters when generated
    #[serde(default = "random_vehicle_id")]
    pub id: String,

    /// Network name of the vehicle's access point
    pub ssid: String,

    /// Display name shown to the user
    #[serde(default)]
    pub name: String,

    /// Shared secret derived during pairing, lowercase hex
    pub shared_secret: String,

    /// Whether the SOCKS5 relay should run for this vehicle
    #[serde(default = "default_socks5_enabled")]
    pub socks5_enabled: bool,
}

impl Vehicle {
    /// Create a record for a freshly paired vehicle.
    ///
    /// Generates a random identifier, names the vehicle after its SSID and
    /// enables the relay.
    pub fn new(ssid: impl Into<String>, shared_secret: impl Into<String>) -> Self {
        let ssid = ssid.into();
        Vehicle {
            id: random_vehicle_id(),
            name: ssid.clone(),
            ssid,
            shared_secret: shared_secret.into(),
            socks5_enabled: true,
        }
    }

    /// True when `key` names this vehicle, by identifier or by SSID.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.ssid == key
    }

    /// Fill fields the decoder left empty.
    fn normalize(mut self) -> Self {
        if self.name.is_empty() {
            self.name = self.ssid.clone();
        }
        self
    }
}

/// Resolve the identity string used to address a vehicle.
///
/// Prefers the trimmed identifier and falls back to the trimmed SSID;
/// returns an empty string when neither is usable.
pub fn resolve_identity(vehicle_id: Option<&str>, vehicle_ssid: Option<&str>) -> String {
    let id = vehicle_id.map(str::trim).unwrap_or("");
    if !id.is_empty() {
        return id.to_string();
    }
    vehicle_ssid.map(str::trim).unwrap_or("").to_string()
}

/// Collection of paired vehicles with JSON persistence
#[derive(Debug, Default, Clone)]
pub struct VehicleRegistry {
    vehicles: Vec<Vehicle>,
}

impl VehicleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        VehicleRegistry::default()
    }

    /// Decode a registry from its JSON list form.
    ///
    /// A blank string decodes to an empty registry.
    pub fn from_json(json: &str) -> Result<Self, CompanionError> {
        if json.trim().is_empty() {
            return Ok(VehicleRegistry::new());
        }
        let vehicles: Vec<Vehicle> = serde_json::from_str(json)?;
        Ok(VehicleRegistry {
            vehicles: vehicles.into_iter().map(Vehicle::normalize).collect(),
        })
    }

    /// Encode the registry as a JSON list.
    pub fn to_json(&self) -> Result<String, CompanionError> {
        Ok(serde_json::to_string(&self.vehicles)?)
    }

    /// Load a registry from a file; a missing file yields an empty registry.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CompanionError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(VehicleRegistry::new());
        }
        let content = std::fs::read_to_string(path)?;
        VehicleRegistry::from_json(&content)
    }

    /// Persist the registry to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CompanionError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Add a vehicle.
    ///
    /// Fails when the registry is full or already holds a vehicle with the
    /// same identifier or SSID.
    pub fn add(&mut self, vehicle: Vehicle) -> Result<(), CompanionError> {
        if self.vehicles.len() >= MAX_VEHICLES {
            return Err(CompanionError::Registry(format!(
                "registry is full ({} vehicles)",
                MAX_VEHICLES
            )));
        }
        if self
            .vehicles
            .iter()
            .any(|v| v.matches(&vehicle.id) || v.matches(&vehicle.ssid))
        {
            return Err(CompanionError::Registry(format!(
                "vehicle '{}' is already paired",
                vehicle.ssid
            )));
        }
        self.vehicles.push(vehicle);
        Ok(())
    }

    /// Remove the vehicle named by `key`; returns whether one was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.vehicles.len();
        self.vehicles.retain(|v| !v.matches(key));
        self.vehicles.len() != before
    }

    /// Find the vehicle named by `key`, by identifier or SSID.
    pub fn find(&self, key: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.matches(key))
    }

    /// All vehicles, in insertion order.
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Number of paired vehicles.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// True when no vehicle is paired.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vehicle(ssid: &str) -> Vehicle {
        Vehicle::new(ssid, "2f51a1c8deadbeef")
    }

    #[test]
    fn test_random_vehicle_id_shape() {
        let id = random_vehicle_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn test_vehicle_new_defaults() {
        let vehicle = test_vehicle("OpenAutoProdigy");
        assert_eq!(vehicle.id.len(), 8);
        assert_eq!(vehicle.name, "OpenAutoProdigy");
        assert_eq!(vehicle.ssid, "OpenAutoProdigy");
        assert!(vehicle.socks5_enabled);
    }

    #[test]
    fn test_vehicle_json_round_trip() {
        let vehicle = Vehicle {
            id: "ab12cd34".to_string(),
            ssid: "CarAP".to_string(),
            name: "My Car".to_string(),
            shared_secret: "deadbeef".to_string(),
            socks5_enabled: false,
        };

        let json = serde_json::to_string(&vehicle).unwrap();
        let decoded: Vehicle = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, vehicle);
    }

    #[test]
    fn test_vehicle_decode_fills_defaults() {
        let json = r#"{"ssid":"CarAP","shared_secret":"deadbeef"}"#;
        let decoded: Vehicle = serde_json::from_str(json).unwrap();
        let decoded = decoded.normalize();

        assert_eq!(decoded.id.len(), 8);
        assert_eq!(decoded.name, "CarAP");
        assert!(decoded.socks5_enabled);
    }

    #[test]
    fn test_vehicle_decode_requires_ssid_and_secret() {
        assert!(serde_json::from_str::<Vehicle>(r#"{"shared_secret":"x"}"#).is_err());
        assert!(serde_json::from_str::<Vehicle>(r#"{"ssid":"CarAP"}"#).is_err());
    }

    #[test]
    fn test_vehicle_matches() {
        let vehicle = Vehicle {
            id: "ab12cd34".to_string(),
            ssid: "CarAP".to_string(),
            name: "CarAP".to_string(),
            shared_secret: "deadbeef".to_string(),
            socks5_enabled: true,
        };

        assert!(vehicle.matches("ab12cd34"));
        assert!(vehicle.matches("CarAP"));
        assert!(!vehicle.matches("carap"));
        assert!(!vehicle.matches(""));
    }

    #[test]
    fn test_resolve_identity() {
        assert_eq!(resolve_identity(Some("ab12cd34"), Some("CarAP")), "ab12cd34");
        assert_eq!(resolve_identity(Some("  ab12cd34  "), None), "ab12cd34");
        assert_eq!(resolve_identity(Some("   "), Some("CarAP")), "CarAP");
        assert_eq!(resolve_identity(None, Some(" CarAP ")), "CarAP");
        assert_eq!(resolve_identity(None, None), "");
    }

    #[test]
    fn test_registry_list_round_trip() {
        let mut registry = VehicleRegistry::new();
        registry.add(test_vehicle("CarA")).unwrap();
        registry.add(test_vehicle("CarB")).unwrap();

        let json = registry.to_json().unwrap();
        let decoded = VehicleRegistry::from_json(&json).unwrap();

        assert_eq!(decoded.vehicles(), registry.vehicles());
    }

    #[test]
    fn test_registry_from_json_blank() {
        assert!(VehicleRegistry::from_json("").unwrap().is_empty());
        assert!(VehicleRegistry::from_json("   ").unwrap().is_empty());
        assert!(VehicleRegistry::from_json("[]").unwrap().is_empty());
    }

    #[test]
    fn test_registry_from_json_invalid() {
        assert!(VehicleRegistry::from_json("not json").is_err());
        assert!(VehicleRegistry::from_json(r#"[{"ssid":"CarAP"}]"#).is_err());
    }

    #[test]
    fn test_registry_add_and_find() {
        let mut registry = VehicleRegistry::new();
        let vehicle = test_vehicle("CarAP");
        let id = vehicle.id.clone();
        registry.add(vehicle).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.find(&id).is_some());
        assert!(registry.find("CarAP").is_some());
        assert!(registry.find("Other").is_none());
    }

    #[test]
    fn test_registry_rejects_duplicate() {
        let mut registry = VehicleRegistry::new();
        registry.add(test_vehicle("CarAP")).unwrap();

        let result = registry.add(test_vehicle("CarAP"));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("already paired"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_cap() {
        let mut registry = VehicleRegistry::new();
        for i in 0..MAX_VEHICLES {
            registry.add(test_vehicle(&format!("Car{}", i))).unwrap();
        }

        let result = registry.add(test_vehicle("OneTooMany"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("full"));
        assert_eq!(registry.len(), MAX_VEHICLES);
    }

    #[test]
    fn test_registry_remove() {
        let mut registry = VehicleRegistry::new();
        registry.add(test_vehicle("CarA")).unwrap();
        registry.add(test_vehicle("CarB")).unwrap();

        assert!(registry.remove("CarA"));
        assert!(!registry.remove("CarA"));
        assert_eq!(registry.len(), 1);
        assert!(registry.find("CarB").is_some());
    }

    #[test]
    fn test_registry_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = VehicleRegistry::load(dir.path().join("none.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vehicles.json");

        let mut registry = VehicleRegistry::new();
        registry.add(test_vehicle("CarA")).unwrap();
        registry.add(test_vehicle("CarB")).unwrap();
        registry.save(&path).unwrap();

        let loaded = VehicleRegistry::load(&path).unwrap();
        assert_eq!(loaded.vehicles(), registry.vehicles());
    }
}
