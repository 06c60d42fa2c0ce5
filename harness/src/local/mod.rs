//! An in-process cluster for running the harness without a validator.
//!
//! `LocalCluster` executes transactions against a set of model programs:
//! SPL Token, the Associated Token Account program, and any number of
//! core bridge and token bridge deployments. Programs see a working copy
//! of every account the transaction references; the copy is written back
//! to the account store only if every instruction succeeds.
//!
//! ```rust,ignore
//! use fork_harness::{fixtures::{DeploymentPair, MINT_INFO_9}, local::LocalCluster};
//!
//! let deployments = DeploymentPair::default();
//! let cluster = LocalCluster::new().with_deployments(&deployments);
//! cluster.add_mint(&MINT_INFO_9, &payer.pubkey());
//! cluster.airdrop(&payer.pubkey(), 10_000_000_000);
//! ```

pub mod account_store;
mod bridge;
mod context;
mod token;

pub use {
    bridge::{CoreBridgeModel, TokenBridgeModel},
    context::{InvokeContext, LocalClock},
    token::{AssociatedTokenModel, TokenModel},
};
use {
    crate::{
        cluster::Cluster,
        fixtures::{Deployment, DeploymentPair, MintInfo},
    },
    account_store::AccountStore,
    fork_harness_error::HarnessError,
    fork_harness_keys::KeyMap,
    fork_harness_programs_token::{associated_token, token as spl_token},
    fork_harness_result::{
        ExecutionResult, FailureReason, TokenBalanceChange, TransactionDetails,
        TransactionFailure,
    },
    log::debug,
    solana_account::Account,
    solana_hash::Hash,
    solana_instruction::{error::InstructionError, Instruction},
    solana_keypair::Keypair,
    solana_message::Message,
    solana_pubkey::Pubkey,
    solana_signer::Signer,
    solana_transaction::Transaction,
    solana_transaction_error::TransactionError,
    std::{
        cell::{Cell, RefCell},
        collections::HashMap,
        rc::Rc,
    },
};

/// Lamports charged per required signature of a successful transaction.
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

/// A program the local cluster can execute.
pub trait Program {
    fn name(&self) -> &str;

    /// Run one instruction addressed to this program. Account changes made
    /// through `ctx` are discarded if any instruction of the transaction
    /// fails.
    fn process(
        &self,
        ctx: &mut InvokeContext,
        instruction: &Instruction,
    ) -> Result<(), InstructionError>;
}

pub type ProgramRegistry = HashMap<Pubkey, Box<dyn Program>>;

/// An in-process cluster.
///
/// The account store is shared behind `Rc<RefCell<_>>` so that callers can
/// hold on to it and inspect state between transactions.
pub struct LocalCluster<AS: AccountStore = HashMap<Pubkey, Account>> {
    pub account_store: Rc<RefCell<AS>>,
    programs: ProgramRegistry,
    clock: Cell<LocalClock>,
}

impl Default for LocalCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCluster {
    /// A cluster with SPL Token and the Associated Token Account program,
    /// and no bridge deployments.
    pub fn new() -> Self {
        Self::with_account_store(HashMap::new())
    }
}

impl<AS: AccountStore> LocalCluster<AS> {
    pub fn with_account_store(account_store: AS) -> Self {
        let mut programs: ProgramRegistry = HashMap::new();
        programs.insert(spl_token::ID, Box::new(TokenModel));
        programs.insert(associated_token::ID, Box::new(AssociatedTokenModel));
        Self {
            account_store: Rc::new(RefCell::new(account_store)),
            programs,
            clock: Cell::new(LocalClock::default()),
        }
    }

    /// Deploy both sides of `deployments` with the default token bridge
    /// behavior.
    pub fn with_deployments(mut self, deployments: &DeploymentPair) -> Self {
        self.add_deployment(&deployments.candidate, TokenBridgeModel::new());
        self.add_deployment(&deployments.reference, TokenBridgeModel::new());
        self
    }

    /// Register `program` at `program_id`, replacing whatever ran there.
    pub fn add_program(&mut self, program_id: Pubkey, program: Box<dyn Program>) {
        debug!("Deploying {} at {program_id}", program.name());
        self.programs.insert(program_id, program);
    }

    pub fn add_deployment(&mut self, deployment: &Deployment, token_bridge: TokenBridgeModel) {
        self.add_program(deployment.token_bridge, Box::new(token_bridge));
        self.add_program(deployment.core_bridge, Box::new(CoreBridgeModel));
    }

    pub fn is_deployed(&self, program_id: &Pubkey) -> bool {
        self.programs.contains_key(program_id)
    }

    /// Create `mint` with no supply, mintable by `authority`.
    pub fn add_mint(&self, mint: &MintInfo, authority: &Pubkey) {
        self.set_account(
            mint.address,
            spl_token::create_account_for_mint(spl_token::new_mint(authority, mint.decimals, 0)),
        );
    }

    pub fn airdrop(&self, address: &Pubkey, lamports: u64) {
        let mut store = self.account_store.borrow_mut();
        let mut account = store
            .get_account(address)
            .unwrap_or_else(|| store.default_account(address));
        account.lamports = account.lamports.saturating_add(lamports);
        store.store_account(*address, account);
    }

    pub fn set_account(&self, address: Pubkey, account: Account) {
        self.account_store
            .borrow_mut()
            .store_account(address, account);
    }

    pub fn clock(&self) -> LocalClock {
        self.clock.get()
    }

    pub fn warp_to_slot(&self, slot: u64) {
        let clock = self.clock.get();
        self.clock.set(LocalClock { slot, ..clock });
    }

    pub fn warp_to_timestamp(&self, unix_timestamp: i64) {
        let clock = self.clock.get();
        self.clock.set(LocalClock {
            unix_timestamp,
            ..clock
        });
    }

    fn load_accounts(&self, key_map: &KeyMap) -> HashMap<Pubkey, Account> {
        let store = self.account_store.borrow();
        key_map
            .keys()
            .map(|key| {
                let account = store
                    .get_account(key)
                    .unwrap_or_else(|| store.default_account(key));
                (*key, account)
            })
            .collect()
    }

    fn sign(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<Transaction, TransactionError> {
        let mut blockhash = [0u8; 32];
        blockhash[..8].copy_from_slice(&self.clock.get().slot.to_le_bytes());

        let message = Message::new(instructions, Some(payer));
        let mut transaction = Transaction::new_unsigned(message);
        transaction
            .try_sign(signers, Hash::new_from_array(blockhash))
            .map_err(|err| {
                debug!("Signing failed: {err}");
                TransactionError::SignatureFailure
            })?;
        Ok(transaction)
    }

    /// Check everything that rejects a transaction before any instruction
    /// runs, and sign it.
    fn sanitize(
        &self,
        key_map: &KeyMap,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<Transaction, TransactionError> {
        let signed = signers
            .iter()
            .map(|keypair| keypair.pubkey())
            .collect::<Vec<_>>();
        if let Err(err) = key_map.verify_signers(&signed) {
            debug!("{err}");
            return Err(TransactionError::SignatureFailure);
        }
        if let Some(program_id) = instructions
            .iter()
            .map(|instruction| &instruction.program_id)
            .find(|program_id| !self.programs.contains_key(program_id))
        {
            debug!("No program deployed at {program_id}");
            return Err(TransactionError::ProgramAccountNotFound);
        }
        let transaction = self.sign(instructions, payer, signers)?;

        let fee = LAMPORTS_PER_SIGNATURE * transaction.signatures.len() as u64;
        let payer_lamports = self
            .account_store
            .borrow()
            .get_account(payer)
            .map(|account| account.lamports)
            .unwrap_or_default();
        if payer_lamports == 0 {
            return Err(TransactionError::AccountNotFound);
        }
        if payer_lamports < fee {
            return Err(TransactionError::InsufficientFundsForFee);
        }
        Ok(transaction)
    }

    /// Execute a transaction synchronously.
    pub fn execute(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> ExecutionResult {
        let key_map = KeyMap::compile_with_payer(payer, instructions);
        let transaction = match self.sanitize(&key_map, instructions, payer, signers) {
            Ok(transaction) => transaction,
            Err(err) => return failed(err, vec![]),
        };

        let clock = self.clock.get();
        let pre_accounts = self.load_accounts(&key_map);
        let mut accounts = pre_accounts.clone();
        let mut logs = vec![];

        let outcome = {
            let mut ctx =
                InvokeContext::new(&self.programs, &key_map, &mut accounts, &mut logs, clock);
            instructions
                .iter()
                .enumerate()
                .try_for_each(|(index, instruction)| {
                    ctx.process_instruction(instruction)
                        .map_err(|err| TransactionError::InstructionError(index as u8, err))
                })
                .map(|()| ctx.compute_units_consumed())
        };
        let compute_units = match outcome {
            Ok(units) => units,
            Err(err) => {
                debug!("Transaction failed: {err}");
                return failed(err, logs);
            }
        };

        let fee = LAMPORTS_PER_SIGNATURE * transaction.signatures.len() as u64;
        let Some(payer_account) = accounts.get_mut(payer) else {
            return failed(TransactionError::AccountNotFound, logs);
        };
        let Some(remaining) = payer_account.lamports.checked_sub(fee) else {
            return failed(TransactionError::InsufficientFundsForFee, logs);
        };
        payer_account.lamports = remaining;

        let token_balances = token_balance_changes(&key_map, &pre_accounts, &accounts);
        {
            let mut store = self.account_store.borrow_mut();
            for key in key_map.writable() {
                if let Some(account) = accounts.remove(key) {
                    store.store_account(*key, account);
                }
            }
        }
        self.clock.set(LocalClock {
            slot: clock.slot + 1,
            ..clock
        });

        let signature = transaction.signatures[0];
        debug!("Transaction confirmed: {signature}");
        ExecutionResult::Confirmed(TransactionDetails {
            signature,
            slot: clock.slot,
            logs,
            compute_units_consumed: Some(compute_units),
            token_balances,
        })
    }
}

fn failed(error: TransactionError, logs: Vec<String>) -> ExecutionResult {
    ExecutionResult::Failed(TransactionFailure {
        reason: FailureReason::Transaction(error),
        logs,
    })
}

/// Token balances of every referenced token account, in key order. An
/// account that is a token account on only one side counts as 0 on the
/// other.
fn token_balance_changes(
    key_map: &KeyMap,
    pre: &HashMap<Pubkey, Account>,
    post: &HashMap<Pubkey, Account>,
) -> Vec<TokenBalanceChange> {
    key_map
        .keys()
        .filter_map(|key| {
            let pre = pre.get(key).and_then(spl_token::unpack_token_account);
            let post = post.get(key).and_then(spl_token::unpack_token_account);
            let mint = post.as_ref().or(pre.as_ref())?.mint;
            Some(TokenBalanceChange {
                address: *key,
                mint,
                pre: pre.map(|state| state.amount).unwrap_or_default(),
                post: post.map(|state| state.amount).unwrap_or_default(),
            })
        })
        .collect()
}

impl<AS: AccountStore> Cluster for LocalCluster<AS> {
    async fn process_transaction(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> ExecutionResult {
        // Let every concurrently submitted transaction reach the cluster
        // before any of them executes.
        tokio::task::yield_now().await;
        self.execute(instructions, payer, signers)
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, HarnessError> {
        Ok(self
            .account_store
            .borrow()
            .get_account(address)
            .filter(|account| account.lamports > 0))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::fixtures::{MINT_INFO_8, MINT_INFO_9},
        fork_harness_programs_token_bridge::{
            core_bridge::{legacy_post_message, PostMessageArgs},
            message::PostedMessageV1,
            pda,
        },
    };

    const LAMPORTS: u64 = 10_000_000_000;

    fn funded_cluster(payer: &Keypair) -> LocalCluster {
        let cluster = LocalCluster::new().with_deployments(&DeploymentPair::default());
        cluster.airdrop(&payer.pubkey(), LAMPORTS);
        cluster.add_mint(&MINT_INFO_8, &payer.pubkey());
        cluster.add_mint(&MINT_INFO_9, &payer.pubkey());
        cluster
    }

    fn token_amount(cluster: &LocalCluster, address: &Pubkey) -> Option<u64> {
        cluster
            .account_store
            .borrow()
            .get_account(address)
            .and_then(|account| spl_token::unpack_token_account(&account))
            .map(|state| state.amount)
    }

    #[test]
    fn test_mint_into_associated_account() {
        let payer = Keypair::new();
        let cluster = funded_cluster(&payer);
        let owner = payer.pubkey();
        let ata = associated_token::address(&owner, &MINT_INFO_9.address);

        let instructions = [
            associated_token::create_idempotent(&owner, &owner, &MINT_INFO_9.address),
            spl_token::mint_to(&MINT_INFO_9.address, &ata, &owner, 500).unwrap(),
        ];
        let result = cluster.execute(&instructions, &owner, &[&payer]);

        assert!(result.is_ok(), "{}", result.summary());
        assert_eq!(token_amount(&cluster, &ata), Some(500));
        assert_eq!(result.token_balance(&ata).unwrap().delta(), 500);
        assert_eq!(cluster.clock().slot, 2);

        let again = cluster.execute(&instructions, &owner, &[&payer]);
        assert!(again.is_ok(), "{}", again.summary());
        assert_eq!(token_amount(&cluster, &ata), Some(1_000));
    }

    #[test]
    fn test_revoke_clears_leftover_delegation() {
        let payer = Keypair::new();
        let cluster = funded_cluster(&payer);
        let owner = payer.pubkey();
        let ata = associated_token::address(&owner, &MINT_INFO_9.address);
        let delegate = Pubkey::new_unique();

        let setup = [
            associated_token::create_idempotent(&owner, &owner, &MINT_INFO_9.address),
            spl_token::mint_to(&MINT_INFO_9.address, &ata, &owner, 500).unwrap(),
            spl_token::approve(&ata, &delegate, &owner, 8).unwrap(),
        ];
        let result = cluster.execute(&setup, &owner, &[&payer]);
        assert!(result.is_ok(), "{}", result.summary());

        let delegation = |cluster: &LocalCluster| {
            let state = cluster
                .account_store
                .borrow()
                .get_account(&ata)
                .and_then(|account| spl_token::unpack_token_account(&account))
                .unwrap();
            (Option::<Pubkey>::from(state.delegate), state.delegated_amount)
        };
        assert_eq!(delegation(&cluster), (Some(delegate), 8));

        let impostor = Keypair::new();
        let result = cluster.execute(
            &[spl_token::revoke(&ata, &impostor.pubkey()).unwrap()],
            &owner,
            &[&payer, &impostor],
        );
        assert_eq!(
            result.error_class(),
            Some(fork_harness_result::ErrorClass::Authorization)
        );
        assert_eq!(delegation(&cluster), (Some(delegate), 8));

        let result = cluster.execute(&[spl_token::revoke(&ata, &owner).unwrap()], &owner, &[&payer]);
        assert!(result.is_ok(), "{}", result.summary());
        assert!(result
            .logs()
            .iter()
            .any(|line| line == "Program log: Instruction: Revoke"));
        assert_eq!(delegation(&cluster), (None, 0));
    }

    #[test]
    fn test_failure_leaves_store_untouched() {
        let payer = Keypair::new();
        let cluster = funded_cluster(&payer);
        let owner = payer.pubkey();
        let ata = associated_token::address(&owner, &MINT_INFO_8.address);
        let impostor = Keypair::new();

        let instructions = [
            associated_token::create_idempotent(&owner, &owner, &MINT_INFO_8.address),
            spl_token::mint_to(&MINT_INFO_8.address, &ata, &impostor.pubkey(), 500).unwrap(),
        ];
        let result = cluster.execute(&instructions, &owner, &[&payer, &impostor]);

        assert_eq!(
            result.error_class(),
            Some(fork_harness_result::ErrorClass::Authorization)
        );
        assert_eq!(token_amount(&cluster, &ata), None);
        assert_eq!(
            cluster
                .account_store
                .borrow()
                .get_account(&owner)
                .unwrap()
                .lamports,
            LAMPORTS
        );
        assert_eq!(cluster.clock().slot, 1);
    }

    #[test]
    fn test_missing_signer_is_rejected_before_execution() {
        let payer = Keypair::new();
        let cluster = funded_cluster(&payer);
        let owner = Keypair::new();
        let ata = associated_token::address(&owner.pubkey(), &MINT_INFO_8.address);

        let instructions =
            [spl_token::approve(&ata, &Pubkey::new_unique(), &owner.pubkey(), 1).unwrap()];
        let result = cluster.execute(&instructions, &payer.pubkey(), &[&payer]);

        match result {
            ExecutionResult::Failed(failure) => {
                assert_eq!(
                    failure.reason,
                    FailureReason::Transaction(TransactionError::SignatureFailure)
                );
                assert!(failure.logs.is_empty());
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_program_is_rejected() {
        let payer = Keypair::new();
        let cluster = funded_cluster(&payer);

        let instructions = [Instruction::new_with_bytes(Pubkey::new_unique(), &[], vec![])];
        let result = cluster.execute(&instructions, &payer.pubkey(), &[&payer]);

        assert_eq!(
            result.error_class(),
            Some(fork_harness_result::ErrorClass::Other(
                "ProgramAccountNotFound".to_string()
            ))
        );
    }

    #[test]
    fn test_post_message_increments_sequence() {
        let payer = Keypair::new();
        let cluster = funded_cluster(&payer);
        let core_bridge = Deployment::REFERENCE.core_bridge;
        let emitter = Keypair::new();
        let sequence = pda::core_emitter_sequence(&core_bridge, &emitter.pubkey());

        let mut posted = vec![];
        for nonce in 0..2 {
            let message = Keypair::new();
            let ix = legacy_post_message(
                &core_bridge,
                &message.pubkey(),
                &emitter.pubkey(),
                &payer.pubkey(),
                &PostMessageArgs {
                    nonce,
                    payload: vec![1, 2, 3],
                    consistency_level: 1,
                },
            );
            let result = cluster.execute(&[ix], &payer.pubkey(), &[&payer, &message, &emitter]);
            assert!(result.is_ok(), "{}", result.summary());
            assert!(result
                .logs()
                .iter()
                .any(|line| line == &format!("Program log: Sequence: {nonce}")));

            let account = cluster
                .account_store
                .borrow()
                .get_account(&message.pubkey())
                .unwrap();
            assert_eq!(account.owner, core_bridge);
            posted.push(PostedMessageV1::decode(&account.data).unwrap());
        }

        assert_eq!(posted[0].sequence, 0);
        assert_eq!(posted[1].sequence, 1);
        assert_eq!(posted[1].nonce, 1);
        assert_eq!(posted[0].emitter, emitter.pubkey());
        assert_eq!(
            cluster
                .account_store
                .borrow()
                .get_account(&sequence)
                .unwrap()
                .data,
            2u64.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_warp_clock() {
        let cluster = LocalCluster::new();
        cluster.warp_to_slot(100);
        cluster.warp_to_timestamp(1_800_000_000);
        assert_eq!(
            cluster.clock(),
            LocalClock {
                slot: 100,
                unix_timestamp: 1_800_000_000,
            }
        );
    }
}
