//! Genesis assembly: turns a closed quorum into one response per participant.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use quorum_topology::{derive_peer_lists, SelfPeering, Topology, TOPOLOGY_FILE_NAME};
use tracing::{info, warn};

use crate::error::Result;
use crate::genesis::GenesisDocument;
use crate::models::Output;
use crate::params::{
    load_json_optional, read_optional, OperatorParams, ACCOUNTS_FILE_NAME, PARAMS_FILE_NAME,
};
use crate::quorum::QuorumState;

/// Where the operator sources live.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    /// Directory holding `params.json`, `accounts.json` and `topology.json`.
    pub config_dir: PathBuf,
    /// Overrides `<config_dir>/params.json`.
    pub params_file: Option<PathBuf>,
    /// Genesis template; the embedded template when unset.
    pub genesis_template: Option<PathBuf>,
}

impl SourcePaths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            params_file: None,
            genesis_template: None,
        }
    }

    pub fn params_path(&self) -> PathBuf {
        self.params_file
            .clone()
            .unwrap_or_else(|| self.config_dir.join(PARAMS_FILE_NAME))
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.config_dir.join(ACCOUNTS_FILE_NAME)
    }

    pub fn topology_path(&self) -> PathBuf {
        self.config_dir.join(TOPOLOGY_FILE_NAME)
    }
}

/// Everything read from disk, loaded and validated once at startup.
#[derive(Debug, Clone)]
pub struct AssemblySources {
    pub template: GenesisDocument,
    pub params: OperatorParams,
    /// Operator-mandated balances; override faucet requests.
    pub default_accounts: BTreeMap<String, String>,
    pub topology: Topology,
}

impl AssemblySources {
    /// Sources with only a template: no params, no extra accounts, full mesh.
    pub fn new(template: GenesisDocument) -> Self {
        Self {
            template,
            params: OperatorParams::default(),
            default_accounts: BTreeMap::new(),
            topology: Topology::full_mesh(),
        }
    }

    pub fn with_params(mut self, params: OperatorParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_default_accounts(mut self, accounts: BTreeMap<String, String>) -> Self {
        self.default_accounts = accounts;
        self
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Read every source. Missing files fall back to defaults.
    pub fn load(paths: &SourcePaths) -> Result<Self> {
        let template = match &paths.genesis_template {
            Some(path) => GenesisDocument::load(path)?,
            None => GenesisDocument::embedded()?,
        };
        let params = OperatorParams::load(&paths.params_path())?;
        let default_accounts: BTreeMap<String, String> =
            load_json_optional(&paths.accounts_path())?.unwrap_or_default();
        let topology = match read_optional(&paths.topology_path())? {
            Some(json) => Topology::from_json(&json)?,
            None => Topology::full_mesh(),
        };

        info!(
            config_dir = %paths.config_dir.display(),
            default_accounts = default_accounts.len(),
            topology_rules = topology.len(),
            "Loaded bootstrap sources"
        );

        Ok(Self {
            template,
            params,
            default_accounts,
            topology,
        })
    }
}

/// Result of assembling a closed quorum.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// The shared document every participant receives.
    pub genesis: GenesisDocument,
    /// Participant name -> serialized [`Output`] frame.
    pub outputs: HashMap<String, String>,
}

/// Build the shared genesis and every named participant's response.
///
/// Balances merge lowest to highest precedence: operator params accounts,
/// faucet requests (later arrivals win), then the accounts file.
///
/// Params accounts always rank below faucets here, including when the
/// params come from the default `params.json` in the config directory. A
/// coordinator that only falls back to its default params file while
/// generating applies those accounts last and lets them override faucets;
/// this one reads every source once at startup, so the order is the same
/// whichever params file was used.
pub fn assemble(
    state: &QuorumState,
    sources: &AssemblySources,
    self_peering: SelfPeering,
) -> Result<Assembly> {
    let mut balances = sources.params.accounts.clone();
    balances.extend(state.accounts().iter().map(|(k, v)| (k.clone(), v.clone())));
    balances.extend(
        sources
            .default_accounts
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    let mut genesis = sources.template.clone();
    if let Some(name) = &sources.params.name {
        genesis.set_name(name)?;
    }
    if let Some(gas_limit) = &sources.params.gas_limit {
        genesis.set_gas_limit(gas_limit)?;
    }
    if let Some(difficulty) = &sources.params.difficulty {
        genesis.set_difficulty(difficulty)?;
    }
    genesis.set_validators(state.validators())?;
    genesis.set_balances(&balances)?;

    let nodes = state.nodes();
    let known: BTreeSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    for name in sources.topology.unknown_names(&known) {
        warn!(name, "Topology names a participant that never enrolled");
    }

    let peer_lists = derive_peer_lists(nodes, &sources.topology, self_peering);

    let mut outputs = HashMap::new();
    for (node, peers) in nodes.iter().zip(peer_lists) {
        if node.is_anonymous() {
            continue;
        }
        let frame = Output {
            genesis: genesis.clone(),
            peers,
        }
        .to_frame()?;
        if outputs.insert(node.name.clone(), frame).is_some() {
            warn!(name = %node.name, "Duplicate participant name; last record wins");
        }
    }

    Ok(Assembly { genesis, outputs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::ParticipantInfo;
    use tempfile::TempDir;

    fn participant(name: &str, address: &str, validator: bool) -> ParticipantInfo {
        ParticipantInfo::new(format!("key-{name}"), address)
            .with_name(name)
            .with_validator(validator)
            .with_host(format!("{name}:30303"))
    }

    fn output(assembly: &Assembly, name: &str) -> Output {
        Output::parse(&assembly.outputs[name]).unwrap()
    }

    #[test]
    fn balance_precedence() {
        let mut state = QuorumState::new(1);
        let mut info = participant("a", "0xa", true);
        info.faucets.insert("0xboth".into(), "faucet".into());
        info.faucets.insert("0xparams".into(), "faucet".into());
        state.record(info).unwrap();

        let params = OperatorParams {
            accounts: [("0xparams".to_string(), "params".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let defaults = [("0xboth".to_string(), "file".to_string())]
            .into_iter()
            .collect();
        let sources = AssemblySources::new(GenesisDocument::embedded().unwrap())
            .with_params(params)
            .with_default_accounts(defaults);

        let assembly = assemble(&state, &sources, SelfPeering::Include).unwrap();
        assert_eq!(assembly.genesis.balance("0xparams"), Some("faucet"));
        assert_eq!(assembly.genesis.balance("0xboth"), Some("file"));
        assert!(assembly.genesis.balance("0xa").is_some());
    }

    #[test]
    fn params_applied() {
        let mut state = QuorumState::new(1);
        state.record(participant("a", "0xa", true)).unwrap();
        let params = OperatorParams {
            name: Some("devnet".into()),
            gas_limit: Some("0x1".into()),
            difficulty: Some("0x2".into()),
            accounts: BTreeMap::new(),
        };
        let sources =
            AssemblySources::new(GenesisDocument::embedded().unwrap()).with_params(params);

        let genesis = assemble(&state, &sources, SelfPeering::Include)
            .unwrap()
            .genesis;
        assert_eq!(genesis.name(), Some("devnet"));
        assert_eq!(genesis.gas_limit(), Some("0x1"));
        assert_eq!(genesis.difficulty(), Some("0x2"));
        assert_eq!(genesis.validators(), ["0xa"]);
    }

    #[test]
    fn anonymous_records_get_no_output_but_are_peers() {
        let mut state = QuorumState::new(1);
        state.record(participant("", "0xp", false)).unwrap();
        state.record(participant("a", "0xa", true)).unwrap();

        let sources = AssemblySources::new(GenesisDocument::embedded().unwrap());
        let assembly = assemble(&state, &sources, SelfPeering::Include).unwrap();

        assert_eq!(assembly.outputs.len(), 1);
        assert_eq!(output(&assembly, "a").peers.len(), 2);
    }

    #[test]
    fn topology_rule_shapes_peers() {
        let mut state = QuorumState::new(2);
        state.record(participant("a", "0xa", true)).unwrap();
        state.record(participant("b", "0xb", true)).unwrap();

        let sources = AssemblySources::new(GenesisDocument::embedded().unwrap())
            .with_topology(Topology::full_mesh().with_rule("a", ["b", "ghost"]));
        let assembly = assemble(&state, &sources, SelfPeering::Include).unwrap();

        assert_eq!(output(&assembly, "a").peers, ["enode://key-b@b:30303"]);
        assert_eq!(
            output(&assembly, "b").peers,
            ["enode://key-a@a:30303", "enode://key-b@b:30303"]
        );
    }

    #[test]
    fn load_from_config_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PARAMS_FILE_NAME), "name: fromdisk\n").unwrap();
        std::fs::write(dir.path().join(ACCOUNTS_FILE_NAME), r#"{"0xf": "9"}"#).unwrap();
        std::fs::write(dir.path().join(TOPOLOGY_FILE_NAME), r#"{"a": ["b"]}"#).unwrap();

        let sources = AssemblySources::load(&SourcePaths::new(dir.path())).unwrap();
        assert_eq!(sources.params.name.as_deref(), Some("fromdisk"));
        assert_eq!(sources.default_accounts["0xf"], "9");
        assert_eq!(sources.topology.rule_for("a"), Some(&["b".to_string()][..]));
    }

    #[test]
    fn load_defaults_when_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let sources = AssemblySources::load(&SourcePaths::new(dir.path())).unwrap();
        assert!(sources.topology.is_full_mesh());
        assert!(sources.default_accounts.is_empty());
        assert_eq!(sources.template, GenesisDocument::embedded().unwrap());
    }

    #[test]
    fn bad_sources_are_config_errors() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(TOPOLOGY_FILE_NAME), "[1, 2]").unwrap();
        assert!(matches!(
            AssemblySources::load(&SourcePaths::new(dir.path())),
            Err(Error::Config(_))
        ));

        let template = dir.path().join("genesis.json");
        std::fs::write(&template, r#"{"name": "x"}"#).unwrap();
        let mut paths = SourcePaths::new(dir.path().join("elsewhere"));
        paths.genesis_template = Some(template);
        assert!(matches!(AssemblySources::load(&paths), Err(Error::Config(_))));
    }
}
