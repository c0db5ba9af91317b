//! Driver input schema.
//!
//! The driver reads one JSON object from stdin.  Unknown keys, missing
//! required keys, and malformed values are all rejected; serde's
//! `deny_unknown_fields` carries the strictness.

use std::io::Read;

use serde::Deserialize;

use crate::errors::ParseError;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub rng: RngConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RngConfig {
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    pub lattice: LatticeConfig,
    pub wavefunction: WavefunctionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LatticeConfig {
    pub size: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WavefunctionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub orbitals: Option<OrbitalsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrbitalsConfig {
    pub filling: Vec<Vec<i64>>,
    #[serde(rename = "boundary-conditions")]
    pub boundary_conditions: Vec<i64>,
}

impl Config {
    pub fn from_reader(reader: impl Read) -> Result<Self, ParseError> {
        let config: Config =
            serde_json::from_reader(reader).map_err(|e| ParseError::new(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse_str(s: &str) -> Result<Self, ParseError> {
        Self::from_reader(s.as_bytes())
    }

    pub fn dimensions(&self) -> usize {
        self.system.lattice.size.len()
    }

    fn validate(&self) -> Result<(), ParseError> {
        let size = &self.system.lattice.size;
        if size.is_empty() || size.len() > 2 {
            return Err(ParseError::new(
                "lattice given has a number of dimensions that is not supported",
            ));
        }
        if size.iter().any(|&l| l <= 0) {
            return Err(ParseError::new(
                "lattice dimensions must be positive integers",
            ));
        }

        let wf = &self.system.wavefunction;
        if wf.kind != "free-fermion" {
            return Err(ParseError::new("invalid wavefunction type"));
        }
        let orbitals = wf
            .orbitals
            .as_ref()
            .ok_or_else(|| ParseError::new("orbitals must be given"))?;

        if orbitals.boundary_conditions.len() != size.len() {
            return Err(ParseError::new(
                "one boundary condition required per dimension",
            ));
        }
        if orbitals.boundary_conditions.iter().any(|&b| b <= 0) {
            return Err(ParseError::new("invalid boundary condition specifier"));
        }

        if orbitals.filling.is_empty() {
            return Err(ParseError::new("at least one orbital must be filled"));
        }
        for momentum in &orbitals.filling {
            if momentum.len() != size.len() {
                return Err(ParseError::new("momentum has wrong dimension"));
            }
            for (k, l) in momentum.iter().zip(size) {
                if *k < 0 || k >= l {
                    return Err(ParseError::new("invalid momentum index"));
                }
            }
        }

        let total_sites: i64 = size.iter().product();
        if orbitals.filling.len() as i64 > total_sites {
            return Err(ParseError::new("more orbitals than sites"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "rng": {"seed": 42},
        "system": {
            "lattice": {"size": [8]},
            "wavefunction": {
                "type": "free-fermion",
                "orbitals": {
                    "filling": [[0], [1], [7]],
                    "boundary-conditions": [2]
                }
            }
        }
    }"#;

    #[test]
    fn test_good_input_parses() {
        let config = Config::parse_str(GOOD).unwrap();
        assert_eq!(config.rng.seed, 42);
        assert_eq!(config.dimensions(), 1);
        let orbitals = config.system.wavefunction.orbitals.unwrap();
        assert_eq!(orbitals.filling.len(), 3);
        assert_eq!(orbitals.boundary_conditions, vec![2]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let bad = GOOD.replace("\"rng\"", "\"rngs\"");
        assert!(Config::parse_str(&bad).is_err());

        let extra = GOOD.replace("\"seed\": 42", "\"seed\": 42, \"state\": 1");
        assert!(Config::parse_str(&extra).is_err());
    }

    #[test]
    fn test_missing_key_rejected() {
        let bad = r#"{"rng": {"seed": 1}}"#;
        assert!(Config::parse_str(bad).is_err());
    }

    #[test]
    fn test_negative_seed_rejected() {
        let bad = GOOD.replace("\"seed\": 42", "\"seed\": -1");
        assert!(Config::parse_str(&bad).is_err());
    }

    #[test]
    fn test_bad_momentum_rejected() {
        let bad = GOOD.replace("[[0], [1], [7]]", "[[0], [1], [8]]");
        assert!(Config::parse_str(&bad).is_err());
        let bad = GOOD.replace("[[0], [1], [7]]", "[[0], [1], [-1]]");
        assert!(Config::parse_str(&bad).is_err());
    }

    #[test]
    fn test_bad_dimension_rejected() {
        let bad = GOOD.replace("\"size\": [8]", "\"size\": [4, 4, 4]");
        assert!(Config::parse_str(&bad).is_err());
        let bad = GOOD.replace("\"size\": [8]", "\"size\": [0]");
        assert!(Config::parse_str(&bad).is_err());
    }

    #[test]
    fn test_bad_wavefunction_type_rejected() {
        let bad = GOOD.replace("free-fermion", "projected-bcs");
        assert!(Config::parse_str(&bad).is_err());
    }

    #[test]
    fn test_bad_boundary_conditions_rejected() {
        let bad = GOOD.replace("\"boundary-conditions\": [2]", "\"boundary-conditions\": [0]");
        assert!(Config::parse_str(&bad).is_err());
        let bad = GOOD.replace(
            "\"boundary-conditions\": [2]",
            "\"boundary-conditions\": [2, 2]",
        );
        assert!(Config::parse_str(&bad).is_err());
    }
}
