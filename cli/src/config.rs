//! Harness configuration file.
//!
//! YAML by default; a `.json` extension is parsed as JSON. Every field is
//! optional and falls back to the built-in fixtures.

use {
    fork_harness::{
        error::HarnessError,
        fixtures::{self, Deployment, DeploymentPair, MintInfo, DEFAULT_AMOUNT, PROVISION_AMOUNT},
        result::Compare,
    },
    serde::{Deserialize, Serialize},
    solana_keypair::Keypair,
    solana_pubkey::Pubkey,
    std::{fs::File, io::Read, path::Path, str::FromStr},
};

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8899";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigFile {
    pub rpc_url: Option<String>,
    /// Path to a keypair file (JSON array of 64 bytes). Must be the mint
    /// authority of every configured mint.
    pub payer: Option<String>,
    /// Path to the sender authority keypair. Random when unset.
    pub sender_authority: Option<String>,
    pub candidate: Option<DeploymentConfig>,
    pub reference: Option<DeploymentConfig>,
    pub mints: Option<Vec<MintConfig>>,
    pub amount: Option<u64>,
    pub provision_amount: Option<u64>,
    pub compares: Option<Vec<Compare>>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    pub token_bridge: String,
    pub core_bridge: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MintConfig {
    pub address: String,
    pub decimals: u8,
}

/// A config file with every default applied and every key parsed.
pub struct Settings {
    pub rpc_url: String,
    pub payer: Option<Keypair>,
    pub sender_authority: Option<Keypair>,
    pub deployments: DeploymentPair,
    pub mints: Vec<MintInfo>,
    pub amount: u64,
    pub provision_amount: u64,
    pub compares: Vec<Compare>,
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey, HarnessError> {
    Pubkey::from_str(value)
        .map_err(|err| HarnessError::Config(format!("{field}: invalid address {value}: {err}")))
}

/// Read a keypair file written as a JSON array of bytes.
pub fn read_keypair_file(path: &str) -> Result<Keypair, HarnessError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| HarnessError::Config(format!("failed to read keypair {path}: {err}")))?;
    let bytes: Vec<u8> = serde_json::from_str(&contents)
        .map_err(|err| HarnessError::Config(format!("malformed keypair {path}: {err}")))?;
    Keypair::try_from(bytes.as_slice())
        .map_err(|err| HarnessError::Config(format!("malformed keypair {path}: {err}")))
}

impl DeploymentConfig {
    fn parse(&self, side: &str) -> Result<Deployment, HarnessError> {
        Ok(Deployment {
            token_bridge: parse_pubkey(&format!("{side}.tokenBridge"), &self.token_bridge)?,
            core_bridge: parse_pubkey(&format!("{side}.coreBridge"), &self.core_bridge)?,
        })
    }
}

impl ConfigFile {
    pub fn try_load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        if Path::new(path)
            .extension()
            .is_some_and(|ext| ext == "json")
        {
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(serde_yaml::from_str(&contents)?)
        }
    }

    pub fn resolve(&self) -> Result<Settings, HarnessError> {
        let defaults = DeploymentPair::default();
        let deployments = DeploymentPair {
            candidate: match &self.candidate {
                Some(candidate) => candidate.parse("candidate")?,
                None => defaults.candidate,
            },
            reference: match &self.reference {
                Some(reference) => reference.parse("reference")?,
                None => defaults.reference,
            },
        };
        if deployments.candidate == deployments.reference {
            return Err(HarnessError::Config(
                "candidate and reference deployments are identical".to_string(),
            ));
        }

        let mints = match &self.mints {
            Some(mints) => mints
                .iter()
                .map(|mint| {
                    Ok(MintInfo {
                        address: parse_pubkey("mints.address", &mint.address)?,
                        decimals: mint.decimals,
                    })
                })
                .collect::<Result<Vec<_>, HarnessError>>()?,
            None => fixtures::mints(),
        };
        if mints.is_empty() {
            return Err(HarnessError::Config("no mints configured".to_string()));
        }

        let amount = self.amount.unwrap_or(DEFAULT_AMOUNT);
        if amount == 0 {
            return Err(HarnessError::Config("amount must be positive".to_string()));
        }

        Ok(Settings {
            rpc_url: self
                .rpc_url
                .clone()
                .unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            payer: self.payer.as_deref().map(read_keypair_file).transpose()?,
            sender_authority: self
                .sender_authority
                .as_deref()
                .map(read_keypair_file)
                .transpose()?,
            deployments,
            mints,
            amount,
            provision_amount: self.provision_amount.unwrap_or(PROVISION_AMOUNT),
            compares: self.compares.clone().unwrap_or_else(Compare::defaults),
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, solana_signer::Signer};

    #[test]
    fn test_empty_config_uses_fixtures() {
        let settings = ConfigFile::default().resolve().unwrap();
        assert_eq!(settings.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(settings.deployments, DeploymentPair::default());
        assert_eq!(settings.mints, fixtures::mints());
        assert_eq!(settings.amount, DEFAULT_AMOUNT);
        assert_eq!(settings.compares, Compare::defaults());
        assert!(settings.payer.is_none());
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
rpcUrl: http://localhost:9999
candidate:
  tokenBridge: B6RHG3mfcckmrYN1UhmJzyS1XX3fZKbkeUcpJe9Sy3FE
  coreBridge: Bridge1p5gheXUvJ6jGWGeCsgPKgnE3YgdGKRVCMY9o
mints:
  - address: HqNPRkwargALrhbTofkS3pnyPg2v5tBdTF7rqD4oKkQi
    decimals: 8
amount: 1000
compares:
  - outcome
  - logs
"#;
        let config: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        let settings = config.resolve().unwrap();
        assert_eq!(settings.rpc_url, "http://localhost:9999");
        assert_eq!(settings.mints, vec![fixtures::MINT_INFO_8]);
        assert_eq!(settings.amount, 1_000);
        assert_eq!(settings.compares, vec![Compare::Outcome, Compare::Logs]);
        assert_eq!(settings.deployments.candidate, Deployment::CANDIDATE);
    }

    #[test]
    fn test_invalid_address_is_a_config_error() {
        let config = ConfigFile {
            mints: Some(vec![MintConfig {
                address: "not-a-key".to_string(),
                decimals: 8,
            }]),
            ..ConfigFile::default()
        };
        assert!(matches!(config.resolve(), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_identical_deployments_rejected() {
        let deployment = || DeploymentConfig {
            token_bridge: Deployment::REFERENCE.token_bridge.to_string(),
            core_bridge: Deployment::REFERENCE.core_bridge.to_string(),
        };
        let config = ConfigFile {
            candidate: Some(deployment()),
            reference: Some(deployment()),
            ..ConfigFile::default()
        };
        assert!(matches!(config.resolve(), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_read_keypair_file() {
        let keypair = Keypair::new();
        let path = std::env::temp_dir().join(format!("fork-harness-{}.json", keypair.pubkey()));
        std::fs::write(
            &path,
            serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap(),
        )
        .unwrap();

        let loaded = read_keypair_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
        std::fs::remove_file(path).unwrap();

        assert!(matches!(
            read_keypair_file("/nonexistent/id.json"),
            Err(HarnessError::Config(_))
        ));
    }
}
