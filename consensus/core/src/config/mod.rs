pub mod genesis;
pub mod params;

use crate::account::AccountKey;
use params::Params;
use std::ops::Deref;

/// Runtime configuration: network params plus the node-level switches
/// recognized by the chain front-end.
#[derive(Clone, Debug)]
pub struct Config {
    pub params: Params,

    /// Account credited as the block integrator (defaults to the dev address)
    pub integrator_address: Option<AccountKey>,
    /// Disables checkpoint enforcement while syncing
    pub disable_checkpoints: bool,
    /// Forces difficulty to 1 and relaxes timing constraints
    pub simulator: bool,
    /// Skips full validation until the chain has caught up
    pub fastsync: bool,
    /// Tag attached to metrics dumps
    pub node_tag: Option<String>,
}

impl Config {
    pub fn new(params: Params) -> Self {
        Self { params, integrator_address: None, disable_checkpoints: false, simulator: false, fastsync: false, node_tag: None }
    }

    pub fn with_integrator_address(mut self, address: AccountKey) -> Self {
        self.integrator_address = Some(address);
        self
    }

    pub fn with_simulator(mut self) -> Self {
        self.simulator = true;
        self
    }

    pub fn with_fastsync(mut self) -> Self {
        self.fastsync = true;
        self
    }

    pub fn with_node_tag(mut self, tag: impl Into<String>) -> Self {
        self.node_tag = Some(tag.into());
        self
    }

    pub fn integrator_address(&self) -> AccountKey {
        self.integrator_address.unwrap_or(self.params.dev_address)
    }
}

impl Deref for Config {
    type Target = Params;

    fn deref(&self) -> &Self::Target {
        &self.params
    }
}

impl AsRef<Params> for Config {
    fn as_ref(&self) -> &Params {
        &self.params
    }
}
