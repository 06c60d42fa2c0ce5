//! # Fork Harness
//!
//! The fork harness runs the same token bridge operation against two
//! deployments of the bridge, a candidate and a reference, and reports
//! every way in which their effects differ.
//!
//! Both deployments live on the same cluster. For every scenario the
//! harness builds one transaction per deployment (an SPL Token approve of
//! that deployment's transfer authority, then the legacy native transfer),
//! submits both concurrently, reads back both posted message accounts, and
//! then:
//!
//! * checks each side on its own against what the arguments require (the
//!   source debit, the normalized message amount, the recorded payload),
//!   and
//! * compares the two sides against each other (outcome, token balance
//!   changes, decoded message fields).
//!
//! A mismatch becomes a `Divergence` attributed to the side it was found
//! on, or to neither side when the two deployments disagree with each
//! other.
//!
//! ## Clusters
//!
//! The harness talks to a cluster only through the `Cluster` trait: submit
//! a transaction and wait for it to settle, or read an account.
//!
//! * `RpcCluster` drives a live validator over JSON-RPC. Both deployments
//!   and the fixture mints must already exist there.
//! * `LocalCluster` executes transactions in process against model
//!   programs. Useful for exercising the harness itself, including injected
//!   regressions.
//!
//! ## Running a Suite
//!
//! ```rust,ignore
//! use fork_harness::{
//!     fixtures::{mints, DeploymentPair, PROVISION_AMOUNT},
//!     local::LocalCluster,
//!     suite::Suite,
//!     HarnessContext,
//! };
//!
//! let cluster = LocalCluster::new().with_deployments(&DeploymentPair::default());
//! for mint in mints() {
//!     cluster.add_mint(&mint, &payer.pubkey());
//! }
//! cluster.airdrop(&payer.pubkey(), 100_000_000_000);
//!
//! let ctx = HarnessContext::new(cluster, payer);
//! let report = Suite::standard(&mints()).run(&ctx, PROVISION_AMOUNT).await?;
//! assert!(report.all_passed());
//! ```
//!
//! ## Single Scenarios
//!
//! Scenarios can also run on their own, once the payer holds tokens of the
//! scenario's mint (see `provision::provision`).
//!
//! ```rust,ignore
//! use fork_harness::{fixtures::{MINT_INFO_9, DEFAULT_AMOUNT}, scenario::Scenario};
//!
//! let report = Scenario::transfer_with_payload(MINT_INFO_9, DEFAULT_AMOUNT)
//!     .run(&ctx)
//!     .await;
//! for divergence in &report.divergences {
//!     println!("{divergence}");
//! }
//! ```
//!
//! ## Validation
//!
//! Which cross-side comparisons run is controlled by
//! `HarnessContext::compares` (see `result::Compare`). By default the
//! outcome, the token balance changes and the posted message are compared;
//! logs and compute units are opt-in. `HarnessContext::config` decides
//! whether a divergence panics immediately or is collected into the
//! report.

pub mod cluster;
pub mod engine;
pub mod fixtures;
pub mod local;
pub mod pair;
pub mod provision;
pub mod rpc;
pub mod scenario;
pub mod suite;

pub use {
    cluster::Cluster, fork_harness_error as error, fork_harness_keys as keys,
    fork_harness_result as result,
};
use {
    fixtures::DeploymentPair,
    fork_harness_keys::{KeypairFactory, RandomKeypairs},
    fork_harness_result::{Compare, Config},
    solana_keypair::Keypair,
};

/// Everything shared by the scenarios of a suite: the cluster, the funded
/// payer, the sender authority and the deployments under test.
///
/// The payer owns the provisioned token accounts and must be the mint
/// authority of every mint the suite provisions.
pub struct HarnessContext<C: Cluster, K: KeypairFactory = RandomKeypairs> {
    pub cluster: C,
    pub payer: Keypair,
    /// Signs every transfer with payload; recorded as the message sender.
    pub sender_authority: Keypair,
    pub deployments: DeploymentPair,
    /// Source of the per-side message account keypairs.
    pub keys: K,
    pub config: Config,
    pub compares: Vec<Compare>,
}

impl<C: Cluster> HarnessContext<C> {
    pub fn new(cluster: C, payer: Keypair) -> Self {
        Self {
            cluster,
            payer,
            sender_authority: Keypair::new(),
            deployments: DeploymentPair::default(),
            keys: RandomKeypairs::new(),
            config: Config::default(),
            compares: Compare::defaults(),
        }
    }
}

impl<C: Cluster, K: KeypairFactory> HarnessContext<C, K> {
    /// Swap the message keypair factory, for example for
    /// `SeededKeypairs` to make local runs reproducible.
    pub fn with_keys<K2: KeypairFactory>(self, keys: K2) -> HarnessContext<C, K2> {
        HarnessContext {
            cluster: self.cluster,
            payer: self.payer,
            sender_authority: self.sender_authority,
            deployments: self.deployments,
            keys,
            config: self.config,
            compares: self.compares,
        }
    }

    pub fn with_deployments(mut self, deployments: DeploymentPair) -> Self {
        self.deployments = deployments;
        self
    }

    pub fn with_sender_authority(mut self, sender_authority: Keypair) -> Self {
        self.sender_authority = sender_authority;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_compares(mut self, compares: Vec<Compare>) -> Self {
        self.compares = compares;
        self
    }
}
