//! Account files and signing identities.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use alloy_primitives::{Address, hex};
use alloy_signer_local::PrivateKeySigner;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::value::{RawValue, to_raw_value};

use crate::AccountsError;

/// One entry of an accounts file.
///
/// Files are JSON arrays of these records, e.g.
/// `[{"index": 1, "address": "0x…", "privateKey": "0x…"}]`. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccountRecord {
    /// 1-based position assigned when the file was generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Hex address of the account.
    pub address: String,
    /// Hex private key of the account.
    pub private_key: String,
    /// Optional BIP-39 phrase. Carried through but never used for signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
}

/// A signing identity: an address plus the private key material that controls it.
///
/// The key is kept as text and only parsed when a transfer is signed, so a malformed key
/// affects that identity's transfers and nothing else.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    address: Address,
    private_key: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity").field("address", &self.address).finish_non_exhaustive()
    }
}

impl Identity {
    /// Creates an identity from an address and hex key material.
    pub fn new(address: Address, private_key: impl Into<String>) -> Self {
        Self { address, private_key: private_key.into() }
    }

    /// The identity's address.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The raw private key material.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

/// Reads an accounts file.
pub fn load_accounts(path: &Path) -> Result<Vec<AccountRecord>, AccountsError> {
    let json = fs::read_to_string(path)
        .map_err(|source| AccountsError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&json)
        .map_err(|source| AccountsError::Parse { path: path.to_path_buf(), source })
}

/// Converts records into identities, keeping file order.
pub fn identities_from_records(records: &[AccountRecord]) -> Result<Vec<Identity>, AccountsError> {
    records
        .iter()
        .enumerate()
        .map(|(position, record)| {
            let address = record.address.trim().parse::<Address>().map_err(|_| {
                AccountsError::InvalidAddress { position, address: record.address.clone() }
            })?;
            Ok(Identity::new(address, record.private_key.trim()))
        })
        .collect()
}

/// Reads an accounts file straight into identities.
pub fn load_identities(path: &Path) -> Result<Vec<Identity>, AccountsError> {
    identities_from_records(&load_accounts(path)?)
}

/// Generates `count` random accounts. A seed makes the output reproducible.
pub fn generate_accounts(count: usize, seed: Option<u64>) -> Vec<AccountRecord> {
    let mut rng = match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    };

    (0..count)
        .map(|i| {
            let signer = PrivateKeySigner::random_with(&mut rng);
            AccountRecord {
                index: Some(i as u64 + 1),
                address: signer.address().to_checksum(None),
                private_key: hex::encode_prefixed(signer.to_bytes()),
                mnemonic: None,
            }
        })
        .collect()
}

/// Writes records as a pretty-printed JSON array.
pub fn save_accounts(records: &[AccountRecord], path: &Path) -> Result<(), AccountsError> {
    let json = serde_json::to_string_pretty(records).map_err(AccountsError::Serialize)?;
    fs::write(path, json).map_err(|source| AccountsError::Io { path: path.to_path_buf(), source })
}

/// Splits records into at most `parts` contiguous chunks of `ceil(len / parts)` records.
pub fn split_accounts(records: &[AccountRecord], parts: usize) -> Vec<Vec<AccountRecord>> {
    if records.is_empty() || parts == 0 {
        return Vec::new();
    }
    let chunk_size = records.len().div_ceil(parts);
    records.chunks(chunk_size).map(<[AccountRecord]>::to_vec).collect()
}

/// One funded entry of a genesis file's `accounts` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenesisAllocation {
    /// `acc0001`, `acc0002`, ... in input order.
    pub name: String,
    /// Address as written in the accounts file.
    pub address: String,
    /// Initial balance in wei, written as a bare JSON number.
    pub balance: u128,
}

/// Funds every record with `balance`, naming them `accNNNN` from 1.
pub fn genesis_allocations(records: &[AccountRecord], balance: u128) -> Vec<GenesisAllocation> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| GenesisAllocation {
            name: format!("acc{:04}", i + 1),
            address: record.address.clone(),
            balance,
        })
        .collect()
}

/// Appends `allocations` to the `accounts` array of a genesis template.
///
/// Every other template value is carried over verbatim, so large integers survive. A
/// missing or non-array `accounts` entry is replaced by a fresh array.
pub fn merge_genesis(
    template: &str,
    allocations: &[GenesisAllocation],
) -> Result<String, serde_json::Error> {
    let mut genesis: BTreeMap<String, Box<RawValue>> = serde_json::from_str(template)?;

    let mut accounts: Vec<Box<RawValue>> = genesis
        .remove("accounts")
        .and_then(|raw| serde_json::from_str(raw.get()).ok())
        .unwrap_or_default();
    for allocation in allocations {
        accounts.push(to_raw_value(allocation)?);
    }
    genesis.insert("accounts".to_string(), to_raw_value(&accounts)?);

    serde_json::to_string_pretty(&genesis)
}

/// Reads the template at `template`, merges `allocations` and writes the result to `out`.
pub fn write_genesis(
    template: &Path,
    allocations: &[GenesisAllocation],
    out: &Path,
) -> Result<(), AccountsError> {
    let json = fs::read_to_string(template)
        .map_err(|source| AccountsError::Io { path: template.to_path_buf(), source })?;
    let genesis = merge_genesis(&json, allocations)
        .map_err(|source| AccountsError::GenesisTemplate { path: template.to_path_buf(), source })?;
    fs::write(out, genesis).map_err(|source| AccountsError::Io { path: out.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ANVIL_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_parse_records_with_optional_fields() {
        let json = format!(
            r#"[
                {{
                    "index": 1,
                    "address": "{ANVIL_ADDRESS}",
                    "privateKey": "{ANVIL_KEY}",
                    "mnemonic": "test test"
                }},
                {{"address": "{ANVIL_ADDRESS}", "privateKey": "{ANVIL_KEY}"}}
            ]"#
        );
        let records: Vec<AccountRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, Some(1));
        assert_eq!(records[0].mnemonic.as_deref(), Some("test test"));
        assert_eq!(records[1].index, None);

        let identities = identities_from_records(&records).unwrap();
        assert_eq!(identities[0].address(), ANVIL_ADDRESS.parse::<Address>().unwrap());
        assert_eq!(identities[0].private_key(), ANVIL_KEY);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = format!(
            r#"[{{"address": "{ANVIL_ADDRESS}", "privateKey": "{ANVIL_KEY}", "balance": "1"}}]"#
        );
        assert!(serde_json::from_str::<Vec<AccountRecord>>(&json).is_err());
    }

    #[test]
    fn test_invalid_address_reports_position() {
        let records = vec![
            AccountRecord {
                index: None,
                address: ANVIL_ADDRESS.into(),
                private_key: ANVIL_KEY.into(),
                mnemonic: None,
            },
            AccountRecord {
                index: None,
                address: "0xnot-an-address".into(),
                private_key: ANVIL_KEY.into(),
                mnemonic: None,
            },
        ];
        match identities_from_records(&records) {
            Err(AccountsError::InvalidAddress { position, .. }) => assert_eq!(position, 1),
            other => panic!("expected invalid address, got {other:?}"),
        }
    }

    #[test]
    fn test_generate_is_reproducible_and_consistent() {
        let a = generate_accounts(3, Some(7));
        let b = generate_accounts(3, Some(7));
        assert_eq!(a, b);
        assert_eq!(a.iter().filter_map(|r| r.index).collect::<Vec<_>>(), vec![1, 2, 3]);

        for record in &a {
            let signer: PrivateKeySigner = record.private_key.parse().unwrap();
            assert_eq!(signer.address(), record.address.parse::<Address>().unwrap());
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let records = generate_accounts(4, Some(1));

        save_accounts(&records, &path).unwrap();
        assert_eq!(load_accounts(&path).unwrap(), records);
        assert_eq!(load_identities(&path).unwrap().len(), 4);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_accounts(Path::new("/nonexistent/accounts.json")).unwrap_err();
        assert!(matches!(err, AccountsError::Io { .. }));
    }

    #[test]
    fn test_split_accounts() {
        let records = generate_accounts(10, Some(3));

        let parts = split_accounts(&records, 3);
        assert_eq!(parts.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(parts.concat(), records);

        let parts = split_accounts(&records[..2], 5);
        assert_eq!(parts.len(), 2);

        assert!(split_accounts(&records, 0).is_empty());
    }

    #[test]
    fn test_identity_debug_hides_key() {
        let identity = Identity::new(Address::ZERO, ANVIL_KEY);
        assert!(!format!("{identity:?}").contains("ac0974"));
    }

    #[test]
    fn test_genesis_allocations_are_numbered_from_one() {
        let records = generate_accounts(3, Some(4));
        let allocations = genesis_allocations(&records, 7);

        let names: Vec<_> = allocations.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["acc0001", "acc0002", "acc0003"]);
        assert_eq!(allocations[2].address, records[2].address);
        assert!(allocations.iter().all(|a| a.balance == 7));
    }

    #[test]
    fn test_merge_genesis_keeps_template_and_appends() {
        let template = r#"{
            "chainId": 4005,
            "accounts": [{"name": "validator", "balance": 123456789012345678901234567890}]
        }"#;
        let records = generate_accounts(2, Some(5));
        let balance = 1_000_000_000_000_000_000_000_000_000;

        let merged = merge_genesis(template, &genesis_allocations(&records, balance)).unwrap();
        assert!(merged.contains("123456789012345678901234567890"));
        assert!(merged.contains(r#""balance":1000000000000000000000000000"#));

        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["chainId"], 4005);
        let accounts = value["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[0]["name"], "validator");
        assert_eq!(accounts[1]["name"], "acc0001");
        assert_eq!(accounts[2]["address"], records[1].address.as_str());
    }

    #[test]
    fn test_merge_genesis_creates_accounts() {
        let merged = merge_genesis(r#"{"accounts": null}"#, &genesis_allocations(&[], 1)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["accounts"], serde_json::json!([]));

        assert!(merge_genesis("[1, 2]", &[]).is_err());
    }

    #[test]
    fn test_write_genesis_reports_template_path() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.json");
        fs::write(&template, "not json").unwrap();

        let err = write_genesis(&template, &[], &dir.path().join("genesis.json")).unwrap_err();
        assert!(matches!(err, AccountsError::GenesisTemplate { path, .. } if path == template));
    }
}
