//! Connected miners and their registry

use super::extranonce::ExtraNonceCounter;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Miner identifier, unique within one manager
pub type MinerId = u32;

/// Network connection a miner arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Protocol a miner speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinerProtocol {
    /// Stratum: gets an extranonce1 and a share difficulty
    Stratum,
    /// Getwork: solves full headers, no extranonce
    Getwork,
}

/// Mining software as reported in the subscribe user agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinerSoftware {
    /// Lowercased software name
    pub name: String,
    /// Version string as sent
    pub version: String,
}

impl MinerSoftware {
    /// Create a software descriptor
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            version: version.into(),
        }
    }

    /// Parse a `name/version` user agent
    pub fn from_user_agent(agent: &str) -> Option<Self> {
        let (name, version) = agent.trim().split_once('/')?;
        let version = version.split_whitespace().next().unwrap_or_default();
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(name, version))
    }

    /// Whether this is `other` at exactly the same version
    pub fn matches(&self, other: &MinerSoftware) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.version == other.version
    }
}

impl fmt::Display for MinerSoftware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// A connected miner
#[derive(Debug, Clone, PartialEq)]
pub struct Miner {
    id: MinerId,
    connection: ConnectionId,
    protocol: MinerProtocol,
    username: Option<String>,
    authenticated: bool,
    extra_nonce1: u32,
    difficulty: f64,
    previous_difficulty: f64,
    software: Option<MinerSoftware>,
}

impl Miner {
    /// Miner identifier
    pub fn id(&self) -> MinerId {
        self.id
    }

    /// Connection the miner arrived on
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Protocol the miner speaks
    pub fn protocol(&self) -> MinerProtocol {
        self.protocol
    }

    /// Authenticated username
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Whether the miner has authenticated
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Pool-assigned extranonce (zero for getwork miners)
    pub fn extra_nonce1(&self) -> u32 {
        self.extra_nonce1
    }

    /// Current share difficulty
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    /// Share difficulty before the last retarget, zero if there was none
    pub fn previous_difficulty(&self) -> f64 {
        self.previous_difficulty
    }

    /// Reported mining software
    pub fn software(&self) -> Option<&MinerSoftware> {
        self.software.as_ref()
    }

    /// Retarget the miner, remembering the old difficulty for the grace window
    ///
    /// Returns `false` when the difficulty is unchanged.
    pub fn set_difficulty(&mut self, difficulty: f64) -> bool {
        if self.difficulty == difficulty {
            return false;
        }
        self.previous_difficulty = self.difficulty;
        self.difficulty = difficulty;
        true
    }

    /// Record the miner's user agent
    pub fn set_user_agent(&mut self, agent: &str) {
        self.software = MinerSoftware::from_user_agent(agent);
    }
}

/// Arguments for creating a miner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerArgs {
    /// Connection the miner arrived on
    pub connection: ConnectionId,
    /// User agent from the subscribe request
    pub user_agent: Option<String>,
}

/// Registry of connected miners
#[derive(Debug)]
pub struct MinerManager {
    miners: DashMap<MinerId, Miner>,
    connections: DashMap<ConnectionId, MinerId>,
    counter: AtomicU32,
    extra_nonce: Arc<ExtraNonceCounter>,
}

impl MinerManager {
    /// Create an empty registry drawing extranonces from `extra_nonce`
    pub fn new(extra_nonce: Arc<ExtraNonceCounter>) -> Self {
        Self {
            miners: DashMap::new(),
            connections: DashMap::new(),
            counter: AtomicU32::new(0),
            extra_nonce,
        }
    }

    /// Create and register a miner for `protocol`
    ///
    /// A miner already registered on the same connection is replaced.
    pub fn create(&self, protocol: MinerProtocol, args: MinerArgs) -> Miner {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        let extra_nonce1 = match protocol {
            MinerProtocol::Stratum => self.extra_nonce.next(),
            MinerProtocol::Getwork => 0,
        };

        let miner = Miner {
            id,
            connection: args.connection,
            protocol,
            username: None,
            authenticated: false,
            extra_nonce1,
            difficulty: 0.0,
            previous_difficulty: 0.0,
            software: args.user_agent.as_deref().and_then(MinerSoftware::from_user_agent),
        };

        debug!(
            miner = id,
            connection = %args.connection,
            extranonce1 = %format!("{:08x}", extra_nonce1),
            "created miner"
        );
        self.miners.insert(id, miner.clone());
        if let Some(stale) = self.connections.insert(args.connection, id) {
            self.miners.remove(&stale);
        }
        miner
    }

    /// Snapshot of a miner by id
    pub fn get(&self, id: MinerId) -> Option<Miner> {
        self.miners.get(&id).map(|miner| miner.clone())
    }

    /// Snapshot of the miner on `connection`
    pub fn get_by_connection(&self, connection: ConnectionId) -> Option<Miner> {
        let id = *self.connections.get(&connection)?;
        self.get(id)
    }

    /// Drop the miner on `connection`
    pub fn remove(&self, connection: ConnectionId) -> Option<Miner> {
        let (_, id) = self.connections.remove(&connection)?;
        self.miners.remove(&id).map(|(_, miner)| miner)
    }

    /// Mark a miner authenticated; stratum miners also get `initial_difficulty`
    pub fn authenticate(&self, id: MinerId, username: &str, initial_difficulty: f64) -> bool {
        let Some(mut miner) = self.miners.get_mut(&id) else {
            return false;
        };
        miner.username = Some(username.to_string());
        miner.authenticated = true;
        if miner.protocol == MinerProtocol::Stratum {
            miner.set_difficulty(initial_difficulty);
        }
        debug!(miner = id, username, "authenticated miner");
        true
    }

    /// Retarget a miner
    pub fn set_difficulty(&self, id: MinerId, difficulty: f64) -> bool {
        self.miners
            .get_mut(&id)
            .map(|mut miner| miner.set_difficulty(difficulty))
            .unwrap_or(false)
    }

    /// Number of authenticated miners
    pub fn authenticated_count(&self) -> usize {
        self.miners.iter().filter(|entry| entry.authenticated).count()
    }

    /// Number of registered miners
    pub fn len(&self) -> usize {
        self.miners.len()
    }

    /// Whether no miners are registered
    pub fn is_empty(&self) -> bool {
        self.miners.is_empty()
    }
}
